use procwatch_core::ProcessSpawner;

#[cfg(not(unix))]
compile_error!("procwatch only provides a process spawner for Unix platforms");

/// Spawner selected for the current platform at compile time
#[cfg(unix)]
pub type PlatformSpawner = procwatch_unix::UnixProcessManager;

pub type PlatformHandle = <PlatformSpawner as ProcessSpawner>::Handle;

/// Platform-independent factory that selects the appropriate implementation at compile time
pub struct PlatformProcessSpawnerFactory;

impl PlatformProcessSpawnerFactory {
    pub fn create_spawner() -> PlatformSpawner {
        #[cfg(unix)]
        return procwatch_unix::UnixProcessManagerFactory::create_process_manager();
    }

    pub fn platform_name() -> &'static str {
        #[cfg(unix)]
        return procwatch_unix::UnixProcessManagerFactory::platform_name();
    }
}
