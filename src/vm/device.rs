use crate::memory::Value;
use std::io::{stdout, Write};

/// Create an output device for the virtual machine to operate on. The method
/// `put` receives the value of every executed `PRINT`, in order.
pub trait Device {
    fn put(&mut self, value: &Value) -> Result<(), String>;
}

/// A device used for testing the compiler. It keeps every printed value as a
/// line of text so the tests can compare it against the expected output.
#[derive(Clone, Debug, Default)]
pub struct TestingDevice {
    pub output: Vec<String>,
}

impl TestingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// The output as it would have appeared on standard output.
    pub fn output_str(&self) -> String {
        self.output.iter().map(|line| format!("{line}\n")).collect()
    }

    pub fn output_lines(&self) -> &[String] {
        &self.output
    }
}

impl Device for TestingDevice {
    fn put(&mut self, value: &Value) -> Result<(), String> {
        self.output.push(value.to_string());
        Ok(())
    }
}

/// A device that writes one line per printed value to standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardDevice;

impl Device for StandardDevice {
    fn put(&mut self, value: &Value) -> Result<(), String> {
        let mut out = stdout().lock();
        writeln!(out, "{value}")
            .and_then(|_| out.flush())
            .map_err(|e| format!("could not write output: {e}"))
    }
}
