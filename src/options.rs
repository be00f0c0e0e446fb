/// Largest object number the PDF implementation limits allow.
pub const MAX_OBJECT_ID: u32 = 8_388_607;

/// Maximum allowed embedding of arrays and dictionaries.
pub const MAX_BRACKET: usize = 100;

/// Options for loading PDF documents
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// How many references may be followed while one object is being resolved
    pub max_resolution_depth: usize,

    /// How deeply arrays and dictionaries may nest inside one object
    pub max_nesting_depth: usize,

    /// Cross reference rows naming a larger object number are ignored
    pub max_object_id: u32,

    /// Resolve a reference to `Null` when its generation differs from the table
    pub strict_generation: bool,

    /// Scan the whole file for objects when the xref chain is unusable
    pub full_scan_fallback: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            max_resolution_depth: 32,
            max_nesting_depth: MAX_BRACKET,
            max_object_id: MAX_OBJECT_ID,
            strict_generation: false,
            full_scan_fallback: true,
        }
    }
}

impl LoadOptions {
    /// Create a builder for LoadOptions
    pub fn builder() -> LoadOptionsBuilder {
        LoadOptionsBuilder::default()
    }
}

/// Builder for LoadOptions
#[derive(Default)]
pub struct LoadOptionsBuilder {
    options: LoadOptions,
}

impl LoadOptionsBuilder {
    /// Set the reference resolution depth limit
    pub fn max_resolution_depth(mut self, value: usize) -> Self {
        self.options.max_resolution_depth = value;
        self
    }

    /// Set the array/dictionary nesting limit
    pub fn max_nesting_depth(mut self, value: usize) -> Self {
        self.options.max_nesting_depth = value;
        self
    }

    /// Set the largest accepted object number
    pub fn max_object_id(mut self, value: u32) -> Self {
        self.options.max_object_id = value;
        self
    }

    /// Enable or disable generation checking
    pub fn strict_generation(mut self, value: bool) -> Self {
        self.options.strict_generation = value;
        self
    }

    /// Enable or disable the full-file scan
    pub fn full_scan_fallback(mut self, value: bool) -> Self {
        self.options.full_scan_fallback = value;
        self
    }

    /// Build the LoadOptions
    pub fn build(self) -> LoadOptions {
        LoadOptions {
            max_nesting_depth: self.options.max_nesting_depth.max(1),
            ..self.options
        }
    }
}
