//! The configuration contract the protocol engine consumes (§6).
//!
//! Concrete scalar values (console name, CPU key, temperature, ...) are kept
//! out of this crate; a handler callback returns a string or structure for
//! them. Configuration is a constructor-injected provider rather than
//! process-global state, so handlers take a `&dyn ConfigProvider`.

use std::fmt;

/// A drive exposed by `drivelist`/`dirlist`, e.g. `"HDD"` or `"DVD"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveInfo {
    pub name: String,
}

/// A loaded module reported by module-listing verbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: u32,
    pub size: u32,
}

/// A framebuffer snapshot for the `screenshot` verb: raw pixel bytes plus the
/// header fields the reply's `203-` line carries alongside them (§1's
/// "framed binary screenshots"). Tile reordering of the raw pixels is
/// explicitly out of scope (`spec.md` line 13); this is the buffer as the
/// console would hand it over, uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub pitch: u32,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub colorspace: u32,
    pub data: Vec<u8>,
}

/// Constructor-injected read-only configuration provider.
pub trait ConfigProvider: Send + Sync + fmt::Debug {
    fn console_name(&self) -> String;
    fn drives(&self) -> Vec<DriveInfo>;
    fn modules(&self) -> Vec<ModuleInfo>;
    fn hdd_size_bytes(&self) -> u64;
    fn alternate_ip(&self) -> Option<u32>;
    /// The current framebuffer, if a screenshot source is configured. `None`
    /// means no screenshot is available (e.g. no title running).
    fn screenshot_source(&self) -> Option<Screenshot>;
    fn debug_enabled(&self) -> bool {
        false
    }
}

/// A fixed in-memory [`ConfigProvider`], suitable for tests and demos.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    pub console_name: String,
    pub drives: Vec<DriveInfo>,
    pub modules: Vec<ModuleInfo>,
    pub hdd_size_bytes: u64,
    pub alternate_ip: Option<u32>,
    pub screenshot_source: Option<Screenshot>,
    pub debug_enabled: bool,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            console_name: "XBOX".to_string(),
            drives: vec![
                DriveInfo { name: "HDD".to_string() },
                DriveInfo { name: "DVD".to_string() },
            ],
            modules: Vec::new(),
            hdd_size_bytes: 20 * 1024 * 1024 * 1024,
            alternate_ip: None,
            screenshot_source: None,
            debug_enabled: false,
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn console_name(&self) -> String {
        self.console_name.clone()
    }

    fn drives(&self) -> Vec<DriveInfo> {
        self.drives.clone()
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.clone()
    }

    fn hdd_size_bytes(&self) -> u64 {
        self.hdd_size_bytes
    }

    fn alternate_ip(&self) -> Option<u32> {
        self.alternate_ip
    }

    fn screenshot_source(&self) -> Option<Screenshot> {
        self.screenshot_source.clone()
    }

    fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }
}
