//! Print every function declaration of a C or C++ file
//!
//! Usage: `list_functions <file> [c|c++] [standard] [include-dir...]`

use ccfront::CompilerInstance;
use ccfront_api::{AstCallbackType, Language, Settings};
use std::path::Path;
use std::{env, fs, process};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("usage: list_functions <file> [c|c++] [standard] [include-dir...]");
        process::exit(2);
    };

    let language = match args.get(1).map(String::as_str) {
        Some("c") => Language::C,
        Some("c++") | Some("cxx") => Language::Cxx,
        Some(other) => {
            eprintln!("unknown language '{other}'");
            process::exit(2);
        }
        None if path.ends_with(".c") || path.ends_with(".h") => Language::C,
        None => Language::Cxx,
    };
    let standard = args
        .get(2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(if language == Language::C { 11 } else { 14 });

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("failed to read {path}: {e}");
            process::exit(1);
        }
    };

    let mut settings = Settings::new(language, standard).with_gnu_extensions(true);
    for dir in args.iter().skip(3) {
        settings = settings.with_include_folder(dir);
    }
    if let Some(dir) = Path::new(path).parent() {
        settings = settings.with_include_folder(dir);
    }

    let mut instance = match CompilerInstance::create(settings) {
        Ok(instance) => instance,
        Err(status) => {
            eprintln!("{status}");
            process::exit(1);
        }
    };
    instance.register_ast_callback(AstCallbackType::Function, |decl, _, sm, _| {
        let Some(function) = decl.as_function() else {
            return true;
        };
        let position = sm
            .presumed_loc(function.location())
            .map(|loc| format!("{}:{}:{}", loc.filename, loc.line, loc.column))
            .unwrap_or_else(|| "<unknown>".to_string());
        let params: Vec<&str> = function.parameters().iter().map(|p| p.text).collect();

        println!(
            "{position}: {} {}({}){}{}",
            function.return_type().unwrap_or("?"),
            function.name().unwrap_or("<anonymous>"),
            params.join(", "),
            if function.is_variadic() { " ..." } else { "" },
            if function.is_definition() { " [definition]" } else { "" },
        );
        true
    });

    let status = instance.process_named_buffer(path, &source);
    if !status.message().is_empty() {
        eprint!("{}", status.message());
    }
    println!("{}", status.code());
    if !status.succeeded() {
        process::exit(1);
    }
}
