use crate::cli::Format;

pub fn default_format() -> Format {
    Format::Esm
}

pub fn default_true() -> bool {
    true
}

pub fn default_debounce_ms() -> u64 {
    200
}

pub fn default_watch_ignore() -> Vec<String> {
    vec!["node_modules".to_string(), ".git".to_string()]
}

pub fn default_port() -> u16 {
    3000
}
