//! Console host functions imported by snippets.
//!
//! Every snippet sees a `console` import module backed by the session's
//! terminal. The functions reach the terminal through the store data of
//! the run's boundary ([`HostState`]), never through global state.
//!
//! Strings are passed as `(ptr, len)` pairs into the calling instance's
//! exported `memory`.

use snipbox_terminal::{InputBridge, Markup, OutputBridge, prompt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use wasmtime::{Caller, Extern, Linker, Memory, ResourceLimiter};

/// Signature of one `console` function, in wasm text type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleFunction {
    /// Import field name
    pub name: &'static str,
    /// Parameter types
    pub params: &'static [&'static str],
    /// Result types
    pub results: &'static [&'static str],
    /// Whether the function reads or writes a buffer in the guest's memory
    pub uses_memory: bool,
}

impl ConsoleFunction {
    const fn new(
        name: &'static str,
        params: &'static [&'static str],
        results: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            params,
            results,
            uses_memory: false,
        }
    }

    const fn buffered(
        name: &'static str,
        params: &'static [&'static str],
        results: &'static [&'static str],
    ) -> Self {
        Self {
            uses_memory: true,
            ..Self::new(name, params, results)
        }
    }

    /// Import declaration used by the synthetic wrapper, e.g.
    /// `(import "console" "print" (func $print (param i32 i32)))`.
    #[must_use]
    pub fn import_decl(&self) -> String {
        let mut sig = String::new();
        if !self.params.is_empty() {
            sig.push_str(&format!(" (param {})", self.params.join(" ")));
        }
        if !self.results.is_empty() {
            sig.push_str(&format!(" (result {})", self.results.join(" ")));
        }
        format!(
            "(import \"console\" \"{name}\" (func ${name}{sig}))",
            name = self.name
        )
    }

    /// Human-readable signature, e.g. `(i32 i32) -> (i32)`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!(
            "({}) -> ({})",
            self.params.join(" "),
            self.results.join(" ")
        )
    }
}

/// Export through which buffer functions reach the guest's memory.
pub const MEMORY_EXPORT: &str = "memory";

/// Import module name for the console functions.
pub const CONSOLE_MODULE: &str = "console";

/// Every function in the `console` import module.
pub const CONSOLE_FUNCTIONS: &[ConsoleFunction] = &[
    ConsoleFunction::buffered("print", &["i32", "i32"], &[]),
    ConsoleFunction::buffered("println", &["i32", "i32"], &[]),
    ConsoleFunction::new("newline", &[], &[]),
    ConsoleFunction::buffered("markup", &["i32", "i32"], &[]),
    ConsoleFunction::buffered("markup_line", &["i32", "i32"], &[]),
    ConsoleFunction::new("print_i32", &["i32"], &[]),
    ConsoleFunction::new("print_i64", &["i64"], &[]),
    ConsoleFunction::new("print_f64", &["f64"], &[]),
    ConsoleFunction::new("clear", &["i32"], &[]),
    ConsoleFunction::new("cursor_up", &["i32"], &[]),
    ConsoleFunction::new("cursor_down", &["i32"], &[]),
    ConsoleFunction::new("cursor_left", &["i32"], &[]),
    ConsoleFunction::new("cursor_right", &["i32"], &[]),
    ConsoleFunction::new("cursor_set", &["i32", "i32"], &[]),
    ConsoleFunction::new("read_key", &[], &["i32"]),
    ConsoleFunction::buffered("read_line", &["i32", "i32"], &["i32"]),
    ConsoleFunction::buffered("fail", &["i32", "i32"], &[]),
];

/// Looks up a console function by name.
#[must_use]
pub fn console_function(name: &str) -> Option<&'static ConsoleFunction> {
    CONSOLE_FUNCTIONS.iter().find(|f| f.name == name)
}

/// Error raised by `console.fail`: the snippet's own unhandled error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SnippetFailure {
    /// Message supplied by the snippet
    pub message: String,
}

/// Memory limiter for a boundary's store.
#[derive(Debug, Clone, Copy)]
pub struct MemoryLimiter {
    max_memory_bytes: usize,
}

impl MemoryLimiter {
    /// Maximum number of table elements any table may grow to.
    const MAX_TABLE_ELEMENTS: usize = 100_000;

    /// Creates a limiter allowing `max_memory_bytes` per memory.
    #[must_use]
    pub const fn new(max_memory_bytes: usize) -> Self {
        Self { max_memory_bytes }
    }
}

impl ResourceLimiter for MemoryLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.max_memory_bytes {
            tracing::warn!(
                desired,
                limit = self.max_memory_bytes,
                "snippet memory limit exceeded"
            );
            Ok(false)
        } else {
            tracing::trace!(current, desired, "memory growing");
            Ok(true)
        }
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        Ok(desired <= Self::MAX_TABLE_ELEMENTS)
    }
}

/// Store data of an execution boundary.
#[derive(Debug)]
pub struct HostState {
    output: OutputBridge,
    input: InputBridge,
    cancel: CancellationToken,
    pub(crate) limiter: MemoryLimiter,
    host_calls: u64,
}

impl HostState {
    /// Creates the state for one run.
    #[must_use]
    pub const fn new(
        output: OutputBridge,
        input: InputBridge,
        cancel: CancellationToken,
        limiter: MemoryLimiter,
    ) -> Self {
        Self {
            output,
            input,
            cancel,
            limiter,
            host_calls: 0,
        }
    }

    /// Number of console calls made so far.
    #[must_use]
    pub const fn host_calls(&self) -> u64 {
        self.host_calls
    }
}

type HostCaller<'a> = Caller<'a, HostState>;

/// Registers every function of [`CONSOLE_FUNCTIONS`] on `linker`.
///
/// # Errors
///
/// Returns an error if a name is registered twice.
pub fn link_console(linker: &mut Linker<HostState>) -> anyhow::Result<()> {
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "print",
        |caller: HostCaller<'_>, (ptr, len): (i32, i32)| Box::new(print(caller, ptr, len, false)),
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "println",
        |caller: HostCaller<'_>, (ptr, len): (i32, i32)| Box::new(print(caller, ptr, len, true)),
    )?;
    linker.func_wrap_async(CONSOLE_MODULE, "newline", |caller: HostCaller<'_>, (): ()| {
        Box::new(write_number(caller, String::new(), true))
    })?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "markup",
        |caller: HostCaller<'_>, (ptr, len): (i32, i32)| Box::new(markup(caller, ptr, len, false)),
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "markup_line",
        |caller: HostCaller<'_>, (ptr, len): (i32, i32)| Box::new(markup(caller, ptr, len, true)),
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "print_i32",
        |caller: HostCaller<'_>, (value,): (i32,)| {
            Box::new(write_number(caller, value.to_string(), false))
        },
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "print_i64",
        |caller: HostCaller<'_>, (value,): (i64,)| {
            Box::new(write_number(caller, value.to_string(), false))
        },
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "print_f64",
        |caller: HostCaller<'_>, (value,): (f64,)| {
            Box::new(write_number(caller, value.to_string(), false))
        },
    )?;
    linker.func_wrap_async(CONSOLE_MODULE, "clear", |caller: HostCaller<'_>, (home,): (i32,)| {
        Box::new(clear(caller, home != 0))
    })?;
    linker.func_wrap_async(CONSOLE_MODULE, "cursor_up", |caller: HostCaller<'_>, (n,): (i32,)| {
        Box::new(move_cursor(caller, CursorMove::Up(clamp_count(n))))
    })?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "cursor_down",
        |caller: HostCaller<'_>, (n,): (i32,)| {
            Box::new(move_cursor(caller, CursorMove::Down(clamp_count(n))))
        },
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "cursor_left",
        |caller: HostCaller<'_>, (n,): (i32,)| {
            Box::new(move_cursor(caller, CursorMove::Left(clamp_count(n))))
        },
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "cursor_right",
        |caller: HostCaller<'_>, (n,): (i32,)| {
            Box::new(move_cursor(caller, CursorMove::Right(clamp_count(n))))
        },
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "cursor_set",
        |caller: HostCaller<'_>, (column, row): (i32, i32)| {
            Box::new(move_cursor(
                caller,
                CursorMove::To(clamp_count(column), clamp_count(row)),
            ))
        },
    )?;
    linker.func_wrap_async(CONSOLE_MODULE, "read_key", |caller: HostCaller<'_>, (): ()| {
        Box::new(read_key(caller))
    })?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "read_line",
        |caller: HostCaller<'_>, (ptr, cap): (i32, i32)| Box::new(read_line(caller, ptr, cap)),
    )?;
    linker.func_wrap_async(
        CONSOLE_MODULE,
        "fail",
        |caller: HostCaller<'_>, (ptr, len): (i32, i32)| Box::new(fail(caller, ptr, len)),
    )?;

    tracing::debug!(functions = CONSOLE_FUNCTIONS.len(), "console host functions linked");
    Ok(())
}

fn clamp_count(n: i32) -> u16 {
    u16::try_from(n.max(0)).unwrap_or(u16::MAX)
}

fn guest_memory(caller: &mut HostCaller<'_>) -> anyhow::Result<Memory> {
    match caller.get_export(MEMORY_EXPORT) {
        Some(Extern::Memory(memory)) => Ok(memory),
        _ => anyhow::bail!("calling module does not export a memory named `memory`"),
    }
}

fn read_string(caller: &mut HostCaller<'_>, ptr: i32, len: i32) -> anyhow::Result<String> {
    let memory = guest_memory(caller)?;
    let data = memory.data(&*caller);
    let start = usize::try_from(ptr)?;
    let len = usize::try_from(len)?;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| anyhow::anyhow!("string ({ptr}, {len}) is outside linear memory"))?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn output(caller: &mut HostCaller<'_>) -> OutputBridge {
    let state = caller.data_mut();
    state.host_calls += 1;
    state.output.clone()
}

async fn print(mut caller: HostCaller<'_>, ptr: i32, len: i32, line: bool) -> anyhow::Result<()> {
    let text = read_string(&mut caller, ptr, len)?;
    let output = output(&mut caller);
    if line {
        output.write_line(&text).await?;
    } else {
        output.write_text(&text).await?;
    }
    Ok(())
}

async fn write_number(mut caller: HostCaller<'_>, text: String, line: bool) -> anyhow::Result<()> {
    let output = output(&mut caller);
    if line {
        output.write_line(&text).await?;
    } else {
        output.write_text(&text).await?;
    }
    Ok(())
}

async fn markup(mut caller: HostCaller<'_>, ptr: i32, len: i32, line: bool) -> anyhow::Result<()> {
    let text = read_string(&mut caller, ptr, len)?;
    let markup = Markup::parse(&text)?;
    let output = output(&mut caller);
    output.write(&markup).await?;
    if line {
        output.write_line("").await?;
    }
    Ok(())
}

async fn clear(mut caller: HostCaller<'_>, home: bool) -> anyhow::Result<()> {
    output(&mut caller).clear(home).await?;
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum CursorMove {
    Up(u16),
    Down(u16),
    Left(u16),
    Right(u16),
    To(u16, u16),
}

async fn move_cursor(mut caller: HostCaller<'_>, movement: CursorMove) -> anyhow::Result<()> {
    let output = output(&mut caller);
    match movement {
        CursorMove::Up(n) => output.cursor_up(n).await?,
        CursorMove::Down(n) => output.cursor_down(n).await?,
        CursorMove::Left(n) => output.cursor_left(n).await?,
        CursorMove::Right(n) => output.cursor_right(n).await?,
        CursorMove::To(column, row) => output.set_cursor(column, row).await?,
    }
    Ok(())
}

async fn read_key(mut caller: HostCaller<'_>) -> anyhow::Result<i32> {
    let state = caller.data_mut();
    state.host_calls += 1;
    let (input, cancel) = (state.input.clone(), state.cancel.clone());

    let key = input.read_key(&cancel).await?;
    Ok(key.map_or(-1, |k| k.code()))
}

async fn read_line(mut caller: HostCaller<'_>, ptr: i32, cap: i32) -> anyhow::Result<i32> {
    let state = caller.data_mut();
    state.host_calls += 1;
    let (output, input, cancel) = (
        state.output.clone(),
        state.input.clone(),
        state.cancel.clone(),
    );

    let capacity = usize::try_from(cap)?;
    let Some(line) = prompt::read_line(&output, &input, &cancel, capacity).await? else {
        return Ok(-1);
    };

    let memory = guest_memory(&mut caller)?;
    memory.write(&mut caller, usize::try_from(ptr)?, line.as_bytes())?;
    Ok(i32::try_from(line.len())?)
}

async fn fail(mut caller: HostCaller<'_>, ptr: i32, len: i32) -> anyhow::Result<()> {
    let message = read_string(&mut caller, ptr, len)?;
    Err(SnippetFailure { message }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build_engine;
    use snipbox_core::{SessionId, TerminalConfig};
    use snipbox_terminal::MemoryTransport;
    use std::sync::Arc;
    use wasmtime::Store;

    #[test]
    fn test_import_decl() {
        let print = console_function("print").unwrap();
        assert_eq!(
            print.import_decl(),
            r#"(import "console" "print" (func $print (param i32 i32)))"#
        );
        let read_key = console_function("read_key").unwrap();
        assert_eq!(
            read_key.import_decl(),
            r#"(import "console" "read_key" (func $read_key (result i32)))"#
        );
        assert_eq!(read_key.signature(), "() -> (i32)");
        assert!(console_function("launch_missiles").is_none());
    }

    #[test]
    fn test_standard_imports_assemble() {
        let decls: Vec<String> = CONSOLE_FUNCTIONS.iter().map(ConsoleFunction::import_decl).collect();
        let text = format!("(module {})", decls.join("\n"));
        assert!(wat::parse_str(text).is_ok());
    }

    #[tokio::test]
    async fn test_every_console_function_is_linked() {
        let engine = build_engine().unwrap();
        let mut linker = Linker::new(&engine);
        link_console(&mut linker).unwrap();

        let transport = Arc::new(MemoryTransport::new());
        let output = OutputBridge::spawn(
            SessionId::generate(),
            transport.clone(),
            &TerminalConfig::default(),
        );
        let input = InputBridge::new(transport, CancellationToken::new());
        let state = HostState::new(output, input, CancellationToken::new(), MemoryLimiter::new(1 << 20));
        let mut store = Store::new(&engine, state);

        for function in CONSOLE_FUNCTIONS {
            assert!(
                linker.get(&mut store, CONSOLE_MODULE, function.name).is_some(),
                "console.{} is not linked",
                function.name
            );
        }
    }

    #[test]
    fn test_memory_limiter() {
        let mut limiter = MemoryLimiter::new(2 * 65536);
        assert!(limiter.memory_growing(0, 65536, None).unwrap());
        assert!(!limiter.memory_growing(65536, 3 * 65536, None).unwrap());
        assert!(limiter.table_growing(0, 10, None).unwrap());
    }

    #[test]
    fn test_snippet_failure_display() {
        let err: anyhow::Error = SnippetFailure {
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "boom");
        assert!(err.downcast_ref::<SnippetFailure>().is_some());
    }
}
