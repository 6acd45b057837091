use std::path::PathBuf;

use xmlview_compiler::compile_stylesheet;
use xmlview_core::ParserOptions;
use xmlview_vm::VM;

use super::input::{ProgramFile, fail, load_document};

pub struct TransformArgs {
    pub file: PathBuf,
    pub stylesheet: PathBuf,
    pub params: Vec<(String, String)>,
    pub color: bool,
}

pub fn run(args: TransformArgs) {
    let program = ProgramFile::read(&args.stylesheet).unwrap_or_else(|e| fail(e));
    let stylesheet = match compile_stylesheet(&program.source, ParserOptions::default()) {
        Ok((stylesheet, warnings)) => {
            program.report(&warnings, args.color);
            stylesheet
        }
        Err(e) => {
            program.report(e.diagnostics(), args.color);
            fail(e);
        }
    };

    let doc = load_document(&args.file).unwrap_or_else(|e| fail(e));
    let vm = VM::builder().params(args.params).build();
    match vm.apply(&stylesheet, &doc.root()) {
        Ok(output) => {
            program.report(&output.diagnostics, args.color);
            println!("{}", output.render());
        }
        Err(e) => {
            program.report(&e.diagnostics, args.color);
            std::process::exit(1);
        }
    }
}
