//! Standard-library tables per language.

use crate::types::Language;

const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

const PYTHON_STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "builtins",
    "calendar", "codecs", "collections", "concurrent", "configparser", "contextlib", "copy",
    "csv", "ctypes", "dataclasses", "datetime", "decimal", "difflib", "email", "enum",
    "fnmatch", "fractions", "functools", "gc", "getpass", "glob", "gzip", "hashlib", "heapq",
    "hmac", "html", "http", "importlib", "inspect", "io", "ipaddress", "itertools", "json",
    "locale", "logging", "math", "multiprocessing", "numbers", "operator", "os", "pathlib",
    "pickle", "platform", "pprint", "queue", "random", "re", "secrets", "select", "shlex",
    "shutil", "signal", "socket", "sqlite3", "ssl", "statistics", "string", "struct",
    "subprocess", "sys", "tarfile", "tempfile", "textwrap", "threading", "time", "timeit",
    "traceback", "types", "typing", "unicodedata", "unittest", "urllib", "uuid", "warnings",
    "weakref", "xml", "zipfile", "zoneinfo",
];

const RUBY_STDLIB: &[&str] = &[
    "benchmark", "bigdecimal", "csv", "date", "digest", "erb", "fileutils", "json", "logger",
    "net", "open3", "openssl", "optparse", "ostruct", "pathname", "pp", "securerandom", "set",
    "socket", "stringio", "tempfile", "time", "timeout", "uri", "yaml",
];

const PHP_BUILTIN_CLASSES: &[&str] = &[
    "ArgumentCountError", "ArithmeticError", "ArrayAccess", "ArrayIterator", "ArrayObject",
    "BadFunctionCallException", "BadMethodCallException", "Closure", "Countable", "DateInterval",
    "DatePeriod", "DateTime", "DateTimeImmutable", "DateTimeInterface", "DateTimeZone",
    "DivisionByZeroError", "DomainException", "Error", "ErrorException", "Exception",
    "Generator", "InvalidArgumentException", "Iterator", "IteratorAggregate", "JsonException",
    "JsonSerializable", "LengthException", "LogicException", "OutOfBoundsException",
    "OutOfRangeException", "OverflowException", "PDO", "PDOException", "PDOStatement",
    "RangeException", "RuntimeException", "SplObjectStorage", "SplQueue", "SplStack",
    "Stringable", "Throwable", "Traversable", "TypeError", "UnexpectedValueException",
    "ValueError", "WeakMap", "stdClass",
];

const RUST_STDLIB: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

/// Returns the stdlib module name `spec` refers to, or `None` when it is not
/// part of `language`'s standard library.
pub fn stdlib_name(spec: &str, language: Language) -> Option<String> {
    match language {
        Language::TypeScript | Language::JavaScript => {
            if let Some(rest) = spec.strip_prefix("node:") {
                return first_of(rest, '/');
            }
            let head = spec.split('/').next()?;
            NODE_BUILTINS.contains(&head).then(|| head.to_string())
        }
        Language::Python => {
            let head = spec.split('.').next()?;
            PYTHON_STDLIB.contains(&head).then(|| head.to_string())
        }
        Language::Ruby => {
            let head = spec.split('/').next()?;
            RUBY_STDLIB.contains(&head).then(|| head.to_string())
        }
        Language::Go => {
            let head = spec.split('/').next()?;
            (!head.is_empty() && !head.contains('.')).then(|| spec.to_string())
        }
        Language::Java | Language::Kotlin => {
            let head = spec.split('.').next()?;
            matches!(head, "java" | "javax" | "jdk" | "sun" | "kotlin" | "kotlinx")
                .then(|| spec.split('.').take(2).collect::<Vec<_>>().join("."))
        }
        Language::Rust => {
            let head = spec.split("::").next()?;
            RUST_STDLIB.contains(&head).then(|| head.to_string())
        }
        Language::Php => {
            let name = spec.trim_start_matches('\\');
            (!name.contains('\\') && PHP_BUILTIN_CLASSES.contains(&name)).then(|| name.to_string())
        }
        Language::CSharp => {
            let head = spec.split('.').next()?;
            (head == "System" || head == "Microsoft")
                .then(|| spec.split('.').take(2).collect::<Vec<_>>().join("."))
        }
        Language::Unknown => None,
    }
}

fn first_of(spec: &str, separator: char) -> Option<String> {
    spec.split(separator)
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_prefix_and_bare_builtins() {
        assert_eq!(stdlib_name("node:fs/promises", Language::TypeScript).as_deref(), Some("fs"));
        assert_eq!(stdlib_name("path", Language::JavaScript).as_deref(), Some("path"));
        assert_eq!(stdlib_name("lodash", Language::JavaScript), None);
    }

    #[test]
    fn go_module_paths_without_a_host_are_stdlib() {
        assert_eq!(stdlib_name("net/http", Language::Go).as_deref(), Some("net/http"));
        assert_eq!(stdlib_name("github.com/spf13/cobra", Language::Go), None);
    }

    #[test]
    fn php_builtins_only_in_global_namespace() {
        assert_eq!(stdlib_name("\\DateTime", Language::Php).as_deref(), Some("DateTime"));
        assert_eq!(stdlib_name("App\\DateTime", Language::Php), None);
    }
}
