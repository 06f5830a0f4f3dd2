//! The `set` command line tool.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    set_harness::cli::execute()
}
