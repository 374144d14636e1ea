pub mod bias;
pub mod config;
pub mod error;
pub mod integrate;
pub mod potential;
pub mod simulation;
pub mod thermostat;

pub use bias::{Hill, MetaDynamics};
pub use config::{
    IntegrationConfig, MassConfig, MetadynamicsConfig, OutputConfig, PotentialConfig, RunConfig,
    SystemConfig, ThermostatConfig, VelocityConfig,
};
pub use error::{MdError, Result};
pub use integrate::VelocityVerlet;
pub use potential::{DoubleWell, Harmonic, LennardJones, Potential};
pub use simulation::{Frame, ReactionCoordinate, Simulation, State, Trajectory};
pub use thermostat::Thermostat;
