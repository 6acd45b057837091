use std::path::PathBuf;

use xmlview_compiler::{Diagnostics, compile_rules, compile_stylesheet};
use xmlview_core::ParserOptions;

use super::input::{ProgramFile, fail};

pub struct CheckArgs {
    pub program: PathBuf,
    pub rules: bool,
    pub color: bool,
}

pub fn run(args: CheckArgs) {
    let program = ProgramFile::read(&args.program).unwrap_or_else(|e| fail(e));
    let diagnostics = compile(&program.source, args.rules);

    program.report(&diagnostics, args.color);
    if diagnostics.has_errors() {
        std::process::exit(1);
    }

    // Silent on success (like cargo check)
}

fn compile(source: &str, rules: bool) -> Diagnostics {
    let options = ParserOptions::default();
    let result = if rules {
        compile_rules(source, options, None).map(|(_, warnings)| warnings)
    } else {
        compile_stylesheet(source, options).map(|(_, warnings)| warnings)
    };
    result.unwrap_or_else(|e| e.into_diagnostics())
}
