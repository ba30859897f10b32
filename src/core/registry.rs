use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use parking_lot::Mutex;

// Locations owned by a live coordinator in this process
static OPEN_LOCATIONS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Claim on an index location, released on drop
#[derive(Debug)]
pub struct Registration {
    location: PathBuf,
}

impl Registration {
    /// Claims `location` for the calling coordinator.
    ///
    /// # Panics
    ///
    /// When another live coordinator in this process owns `location`. Two
    /// coordinators on one location is a programming error.
    pub fn register(location: &Path) -> Self {
        let mut open = OPEN_LOCATIONS.lock();
        if !open.insert(location.to_path_buf()) {
            panic!(
                "index location {} is already open in this process",
                location.display()
            );
        }
        Registration {
            location: location.to_path_buf(),
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        OPEN_LOCATIONS.lock().remove(&self.location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_registered(location: &Path) -> bool {
        OPEN_LOCATIONS.lock().contains(location)
    }

    #[test]
    fn test_drop_releases_location() {
        let location = Path::new("/registry-test/release");
        {
            let registration = Registration::register(location);
            assert_eq!(registration.location(), location);
            assert!(is_registered(location));
        }
        assert!(!is_registered(location));
        let _again = Registration::register(location);
    }

    #[test]
    #[should_panic(expected = "already open")]
    fn test_second_registration_panics() {
        let location = Path::new("/registry-test/twice");
        let _first = Registration::register(location);
        let _second = Registration::register(location);
    }
}
