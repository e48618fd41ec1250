//! Option nodes and the per-plugin registry holding them.
//!
//! A [`Registry`] is built in two explicit passes: [`Registry::register`] walks the
//! descriptor's option tree and creates the declared nodes, then [`Registry::finish`]
//! adds the nodes only reachable through other declarations, compiles the rules that may
//! reference any node and runs the initial synchronisation.

mod file;
mod finish;
mod format;
mod node;
mod registry;
mod selection;

pub use file::{
    file_selection, is_marker, unique_filename, FileSlot, PreviousStep, CUSTOM_MARKER,
    LOCAL_MARKER, PREVIOUS_STEP_PATH,
};
pub use format::NumberFormat;
pub use node::{Derivation, MergeGroup, OptionKind, OptionNode, Toggle, Validation};
pub use registry::{GroupRequirement, Registry, RegistryConfig};
pub use selection::{SelectionItem, SelectionList, Visibility, DEFAULT_CAPTION};
