// Global allocator: jemalloc holds up better than the system allocator
// when many connection tasks allocate concurrently.
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

pub mod book;
pub mod cli;
pub mod engine;
pub mod protocol;
pub mod server;
