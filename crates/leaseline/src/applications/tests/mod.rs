mod autosave;
mod common;
