use crate::{
    driver::options::CompileOptions,
    errors::errors::{Error, ErrorImpl},
    Position,
};

/// Mutable state owned by one compilation and threaded through both passes.
#[derive(Debug)]
pub struct CompilationContext {
    pub options: CompileOptions,
    data_pointer: u32,
    label_counter: u32,
}

impl CompilationContext {
    pub fn new(options: CompileOptions) -> Self {
        CompilationContext {
            options,
            data_pointer: 0,
            label_counter: 0,
        }
    }

    /// Reserves the next word of the static data area and returns its offset.
    pub fn allocate_static(&mut self) -> u32 {
        let offset = self.data_pointer;
        self.data_pointer += 4;
        offset
    }

    /// Bytes of static data reserved so far.
    pub fn static_size(&self) -> u32 {
        self.data_pointer
    }

    /// A fresh suffix for a set of control-flow labels.
    pub fn next_label(&mut self) -> u32 {
        let label = self.label_counter;
        self.label_counter += 1;
        label
    }

    /// Fails with `UnsupportedFeature` when classes are switched off.
    pub fn require_classes(&self, position: &Position) -> Result<(), Error> {
        if self.options.capabilities.classes {
            Ok(())
        } else {
            Err(Error::new(
                ErrorImpl::UnsupportedFeature {
                    feature: String::from("class"),
                },
                position.clone(),
            ))
        }
    }

    /// Fails with `UnsupportedFeature` when arrays are switched off.
    pub fn require_arrays(&self, position: &Position) -> Result<(), Error> {
        if self.options.capabilities.arrays {
            Ok(())
        } else {
            Err(Error::new(
                ErrorImpl::UnsupportedFeature {
                    feature: String::from("array"),
                },
                position.clone(),
            ))
        }
    }
}
