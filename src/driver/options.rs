/// Where function formals and locals live at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalStorage {
    /// Every variable gets a permanent `$gp`-relative slot. Recursive
    /// activations of the same function share their locals.
    #[default]
    Static,
    /// Formals and locals live below `$fp` in the per-call frame.
    Frame,
}

/// Partially supported language features that can be switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub classes: bool,
    pub arrays: bool,
    /// Allow `NewArray` sizes that are not integer constants. The size is
    /// then only checked when the array is allocated.
    pub dynamic_array_sizes: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            classes: true,
            arrays: true,
            dynamic_array_sizes: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileOptions {
    pub local_storage: LocalStorage,
    pub capabilities: Capabilities,
}
