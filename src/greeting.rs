/// Holder for the display name used in the startup greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    name: String,
}

impl Greeting {
    pub fn new() -> Self {
        Self {
            name: "gpio".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> String {
        format!("Hello from {}!", self.name)
    }
}

impl Default for Greeting {
    fn default() -> Self {
        Self::new()
    }
}
