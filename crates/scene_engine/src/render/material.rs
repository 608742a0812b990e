//! Materials: a shader program, a render mode and named parameters
//!
//! Materials are registered in a [`MaterialLibrary`] and referred to by
//! [`MaterialId`]. Programs are compiled explicitly through
//! [`MaterialLibrary::compile_all`] so compilation failures surface at
//! initialization rather than mid-frame.

use std::collections::BTreeMap;

use crate::render::backend::{BlendMode, GpuBackend, ProgramHandle, RenderResult, RenderState, ShaderSource, ShaderValue};

/// Index of a material inside a [`MaterialLibrary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// The built-in flat material every library starts with
    pub const DEFAULT: Self = Self(0);
}

/// How a material's output combines with the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Depth-tested and depth-written, no blending
    #[default]
    Opaque,
    /// Opaque with alpha-tested holes
    Cutout,
    /// Alpha blended, depth-tested but not written
    Translucent,
    /// Added onto the framebuffer, depth-tested but not written
    Additive,
}

impl RenderMode {
    /// Fixed-function state for this mode
    pub fn render_state(self) -> RenderState {
        match self {
            Self::Opaque | Self::Cutout => RenderState::OPAQUE,
            Self::Translucent => RenderState {
                depth_test: true,
                depth_write: false,
                blend: BlendMode::Alpha,
            },
            Self::Additive => RenderState {
                depth_test: true,
                depth_write: false,
                blend: BlendMode::Additive,
            },
        }
    }

    /// Whether the mode is drawn back-to-front after opaque geometry
    pub fn is_transparent(self) -> bool {
        matches!(self, Self::Translucent | Self::Additive)
    }
}

const FLAT_VERTEX: &str = r"#version 330 core
layout(location = 0) in vec3 a_position;

uniform mat4 u_model;
uniform mat4 u_viewProjection;

void main() {
    gl_Position = u_viewProjection * u_model * vec4(a_position, 1.0);
}
";

const FLAT_FRAGMENT: &str = r"#version 330 core
out vec4 frag_color;

uniform vec4 u_color;

void main() {
    frag_color = u_color;
}
";

/// Flat-colour program used by the default material
pub fn flat_shader(name: &str) -> ShaderSource {
    ShaderSource::new(name, FLAT_VERTEX, FLAT_FRAGMENT)
}

/// Shader program plus render mode and parameter values
#[derive(Debug, Clone)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Blend and depth behaviour
    pub mode: RenderMode,
    shader: ShaderSource,
    program: Option<ProgramHandle>,
    parameters: BTreeMap<String, ShaderValue>,
}

impl Material {
    /// Create an uncompiled material
    pub fn new(name: impl Into<String>, shader: ShaderSource, mode: RenderMode) -> Self {
        Self {
            name: name.into(),
            mode,
            shader,
            program: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Flat-colour material
    pub fn flat(name: impl Into<String>, color: [f32; 4], mode: RenderMode) -> Self {
        let name = name.into();
        let shader = flat_shader(&name);
        Self::new(name, shader, mode).with_parameter("u_color", ShaderValue::Vec4(color.into()))
    }

    /// Builder form of [`Self::set_parameter`]
    pub fn with_parameter(mut self, name: impl Into<String>, value: ShaderValue) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Set a parameter applied every time the material is bound
    pub fn set_parameter(&mut self, name: impl Into<String>, value: ShaderValue) {
        self.parameters.insert(name.into(), value);
    }

    /// Parameter value by name
    pub fn parameter(&self, name: &str) -> Option<&ShaderValue> {
        self.parameters.get(name)
    }

    /// Linked program, if compiled
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    /// Whether the material has a live program
    pub fn is_ready(&self, backend: &dyn GpuBackend) -> bool {
        self.program.is_some_and(|program| backend.is_program_valid(program))
    }

    /// Compile the material's program if it has none yet
    pub fn compile(&mut self, backend: &mut dyn GpuBackend) -> RenderResult<ProgramHandle> {
        if let Some(program) = self.program.filter(|&program| backend.is_program_valid(program)) {
            return Ok(program);
        }
        let program = backend.compile_program(&self.shader)?;
        self.program = Some(program);
        Ok(program)
    }

    /// Select the program, apply render state and upload every parameter
    pub fn bind(&self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        let program = self.program.ok_or_else(|| {
            crate::render::backend::RenderError::InvalidHandle(format!("Material '{}' is not compiled", self.name))
        })?;
        backend.use_program(program)?;
        backend.set_render_state(self.mode.render_state());
        for (name, value) in &self.parameters {
            backend.set_parameter(name, value.clone())?;
        }
        Ok(())
    }

    /// Delete the program
    pub fn release(&mut self, backend: &mut dyn GpuBackend) {
        if let Some(program) = self.program.take() {
            backend.delete_program(program);
        }
    }
}

/// Id-indexed material registry
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
}

impl Default for MaterialLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MaterialLibrary {
    /// Library holding only the default flat material
    pub fn new() -> Self {
        Self {
            materials: vec![Material::flat("default", [1.0, 1.0, 1.0, 1.0], RenderMode::Opaque)],
        }
    }

    /// Register a material
    pub fn add(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(u32::try_from(self.materials.len()).unwrap_or(u32::MAX));
        log::debug!("Registered material '{}' as {:?}", material.name, id);
        self.materials.push(material);
        id
    }

    /// Material by id
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Mutable material by id
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    /// Id of the first material with the given name
    pub fn find(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .position(|material| material.name == name)
            .and_then(|index| u32::try_from(index).ok())
            .map(MaterialId)
    }

    /// Number of registered materials, the default included
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Never true; the default material is always present
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Compile every material. All are attempted; the first failure is returned.
    pub fn compile_all(&mut self, backend: &mut dyn GpuBackend) -> RenderResult<()> {
        let mut first_error = None;
        for material in &mut self.materials {
            if let Err(error) = material.compile(backend) {
                log::error!("Material '{}' failed to compile: {}", material.name, error);
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Delete every program
    pub fn release_all(&mut self, backend: &mut dyn GpuBackend) {
        for material in &mut self.materials {
            material.release(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::RenderError;
    use crate::render::software::SoftwareBackend;

    #[test]
    fn test_render_modes_map_to_state() {
        assert_eq!(RenderMode::Opaque.render_state(), RenderState::OPAQUE);
        assert_eq!(RenderMode::Cutout.render_state(), RenderState::OPAQUE);
        assert_eq!(RenderMode::Translucent.render_state().blend, BlendMode::Alpha);
        assert!(!RenderMode::Additive.render_state().depth_write);
        assert!(RenderMode::Additive.is_transparent());
        assert!(!RenderMode::Cutout.is_transparent());
    }

    #[test]
    fn test_library_starts_with_default() {
        let library = MaterialLibrary::new();
        assert_eq!(library.find("default"), Some(MaterialId::DEFAULT));
        assert_eq!(library.len(), 1);
    }

    #[test]
    fn test_bind_uploads_parameters() {
        let mut backend = SoftwareBackend::new(2, 2);
        let mut library = MaterialLibrary::new();
        let glow = library.add(Material::flat("glow", [2.0, 2.0, 2.0, 1.0], RenderMode::Additive));
        library.compile_all(&mut backend).unwrap();

        let material = library.get(glow).unwrap();
        material.bind(&mut backend).unwrap();

        let program = material.program().unwrap();
        assert_eq!(
            backend.program_parameter(program, "u_color"),
            Some(&ShaderValue::Vec4([2.0, 2.0, 2.0, 1.0].into()))
        );
        assert_eq!(backend.render_state(), RenderMode::Additive.render_state());
    }

    #[test]
    fn test_compile_all_reports_failure_but_compiles_rest() {
        let mut backend = SoftwareBackend::new(2, 2);
        backend.fail_program("broken");
        let mut library = MaterialLibrary::new();
        let broken = library.add(Material::flat("broken", [1.0; 4], RenderMode::Opaque));
        let fine = library.add(Material::flat("fine", [1.0; 4], RenderMode::Opaque));

        let result = library.compile_all(&mut backend);
        assert!(matches!(result, Err(RenderError::ShaderCompilation { .. })));
        assert!(!library.get(broken).unwrap().is_ready(&backend));
        assert!(library.get(fine).unwrap().is_ready(&backend));
        assert!(library.get(broken).unwrap().bind(&mut backend).is_err());
    }
}
