use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

macro_rules! console_log {
    ($($t:tt)*) => (log(&format_args!($($t)*).to_string()))
}

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    console_log!("Logscope WASM module initialized");
}

/// Report (or error document) for raw log text or a `{logs, config}`
/// envelope, as a JSON string.
pub fn analyze_to_json(input: &str) -> String {
    logscope_core::process_input(input).to_string()
}

pub fn formats_to_json() -> String {
    logscope_core::get_log_formats().to_string()
}

/// Resolves to the JSON report string. Never rejects.
#[wasm_bindgen(js_name = analyzeLogs)]
pub fn analyze_logs(input: &str) -> js_sys::Promise {
    console_log!("Analyzing {} characters of log text", input.len());
    js_sys::Promise::resolve(&JsValue::from_str(&analyze_to_json(input)))
}

#[wasm_bindgen(js_name = getLogFormats)]
pub fn get_log_formats() -> String {
    formats_to_json()
}
