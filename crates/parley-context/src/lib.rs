//! Parley Context: Decides what a provider sees and post-processes what it says.

mod filters;
mod history;
mod template;

pub use filters::{apply_output_rules, scan_triggers};
pub use history::{assemble_window, HistoryAssembler, HistoryError, MessageSource};
pub use template::{apply_input_template, render_system_prompt, TEXT_PLACEHOLDER};
