use crate::configuration::Configuration;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "appointment_scheduler", about = "Appointment blocks, time slots and bookings")]
pub struct ConfigurationHandler {
    #[arg(long, env = "SCHEDULER_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(short, long, env = "SCHEDULER_PORT", default_value = "3000")]
    port: String,

    /// Used when a block is saved without an explicit slot length.
    #[arg(long, env = "SCHEDULER_SLOT_LENGTH", default_value_t = 15)]
    default_slot_length_minutes: i64,

    /// Seed the in-memory repository with a few example blocks.
    #[arg(long, env = "SCHEDULER_EXAMPLE_DATA")]
    example_data: bool,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn host(&self) -> String {
        self.host.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn default_slot_length_minutes(&self) -> i64 {
        self.default_slot_length_minutes
    }

    fn example_data(&self) -> bool {
        self.example_data
    }
}
