use crate::aoe::DevicePath;

/// A volume manager's share as seen by the AoE backend.
///
/// The device path is fixed for the life of the share. The option string and
/// the active flag are the only fields this crate writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    sharepath: DevicePath,
    shareopts: Option<String>,
    active: bool,
}

impl Share {
    pub fn new(sharepath: DevicePath) -> Self {
        Self {
            sharepath,
            shareopts: None,
            active: false,
        }
    }

    /// Set the initial option string
    pub fn with_options(mut self, shareopts: impl Into<String>) -> Self {
        self.shareopts = Some(shareopts.into());
        self
    }

    pub fn sharepath(&self) -> &DevicePath {
        &self.sharepath
    }

    pub fn shareopts(&self) -> Option<&str> {
        self.shareopts.as_deref()
    }

    pub fn set_shareopts(&mut self, shareopts: Option<String>) {
        self.shareopts = shareopts;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_builder() {
        let path = DevicePath::from_dataset("rpool/test").unwrap();
        let share = Share::new(path.clone()).with_options("shelf=1");

        assert_eq!(share.sharepath(), &path);
        assert_eq!(share.shareopts(), Some("shelf=1"));
        assert!(!share.is_active());
    }
}
