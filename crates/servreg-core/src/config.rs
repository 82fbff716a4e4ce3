//! Names and formatting knobs shared by every pipeline stage.

/// Configuration for locating markers and generating registration code
///
/// The defaults match the server framework this tool was written for:
/// `ServerImpl("id")` above `class Foo : public IServer`, registered through
/// `ServerFactory::RegisterServer<Foo>("id")` inside `inline Bool Init()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrarConfig {
    /// Identifier of the registration marker macro
    pub marker_name: String,
    /// Interface a class must publicly inherit from to qualify
    pub interface_name: String,
    /// Fully qualified factory registration call (without template arguments)
    pub factory_call: String,
    /// Return type of the placeholder function in the template
    pub placeholder_return_type: String,
    /// Name of the placeholder function in the template
    pub placeholder_name: String,
    /// Indentation prefixed to every generated statement
    pub body_indent: String,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            marker_name: "ServerImpl".to_string(),
            interface_name: "IServer".to_string(),
            factory_call: "ServerFactory::RegisterServer".to_string(),
            placeholder_return_type: "Bool".to_string(),
            placeholder_name: "Init".to_string(),
            body_indent: "    ".to_string(),
        }
    }
}

impl RegistrarConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the marker macro identifier
    pub fn marker_name(mut self, name: impl Into<String>) -> Self {
        self.marker_name = name.into();
        self
    }

    /// Sets the required base interface
    pub fn interface_name(mut self, name: impl Into<String>) -> Self {
        self.interface_name = name.into();
        self
    }

    /// Sets the factory registration call
    pub fn factory_call(mut self, call: impl Into<String>) -> Self {
        self.factory_call = call.into();
        self
    }

    /// Sets the placeholder function's return type and name
    pub fn placeholder(mut self, return_type: impl Into<String>, name: impl Into<String>) -> Self {
        self.placeholder_return_type = return_type.into();
        self.placeholder_name = name.into();
        self
    }

    /// Sets the indentation of generated statements
    pub fn body_indent(mut self, indent: impl Into<String>) -> Self {
        self.body_indent = indent.into();
        self
    }
}
