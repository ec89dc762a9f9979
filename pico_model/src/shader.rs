use crate::RGBA8;

/// Index of a [`Shader`] within its [`Model`](crate::Model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderId(usize);

impl ShaderId {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named material.
#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    id: ShaderId,
    name: String,
    map_name: String,
    ambient: RGBA8,
    diffuse: RGBA8,
    specular: RGBA8,
    transparency: f32,
    shininess: f32,
}

impl Shader {
    pub(crate) fn new(id: ShaderId) -> Self {
        Self {
            id,
            name: String::new(),
            map_name: String::new(),
            ambient: RGBA8::new(0, 0, 0, 0),
            diffuse: RGBA8::new(255, 255, 255, 255),
            specular: RGBA8::new(0, 0, 0, 0),
            transparency: 0.0,
            shininess: 0.0,
        }
    }

    #[must_use]
    pub fn id(&self) -> ShaderId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Name of the bitmap the material samples.
    #[must_use]
    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn set_map_name(&mut self, map_name: impl Into<String>) {
        self.map_name = map_name.into();
    }

    #[must_use]
    pub fn ambient_color(&self) -> RGBA8 {
        self.ambient
    }

    pub fn set_ambient_color(&mut self, color: RGBA8) {
        self.ambient = color;
    }

    #[must_use]
    pub fn diffuse_color(&self) -> RGBA8 {
        self.diffuse
    }

    pub fn set_diffuse_color(&mut self, color: RGBA8) {
        self.diffuse = color;
    }

    #[must_use]
    pub fn specular_color(&self) -> RGBA8 {
        self.specular
    }

    pub fn set_specular_color(&mut self, color: RGBA8) {
        self.specular = color;
    }

    #[must_use]
    pub fn transparency(&self) -> f32 {
        self.transparency
    }

    pub fn set_transparency(&mut self, transparency: f32) {
        self.transparency = transparency;
    }

    #[must_use]
    pub fn shininess(&self) -> f32 {
        self.shininess
    }

    pub fn set_shininess(&mut self, shininess: f32) {
        self.shininess = shininess;
    }
}
