use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Android,
    Ios,
    Windows,
    Mac,
}

/// Command groups a platform driver may or may not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ImageComparison,
    ImageElements,
    Settings,
    NetworkConnection,
    TouchActions,
}

impl Platform {
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Platform::Android => &[ImageComparison, ImageElements, Settings, NetworkConnection, TouchActions],
            Platform::Ios => &[ImageComparison, ImageElements, Settings, TouchActions],
            Platform::Windows | Platform::Mac => &[ImageComparison, ImageElements, Settings],
        }
    }

    pub fn supports(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Windows => "windows",
            Platform::Mac => "mac",
        };
        f.write_str(name)
    }
}
