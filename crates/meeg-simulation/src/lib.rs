//! MEEG-Simulation: synthetic source activity and sensor data
//!
//! Single-dipole forward simulation with Gaussian sensor noise, and analytic
//! dipole leadfields for building synthetic datasets.

pub mod dipole;
pub mod forward_simulator;

pub use dipole::*;
pub use forward_simulator::*;
