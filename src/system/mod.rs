pub mod counter_name;
pub mod counters;
pub mod kill;
pub mod platform;
pub mod process;
pub mod sampler;
pub mod sysinfo_source;
