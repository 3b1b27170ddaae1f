// @llm-module-start
/// Geometry helpers.
pub mod geometry {
    // @llm-class-start
    /// A circle described by its radius.
    #[derive(Debug, Clone, Copy)]
    pub struct Circle {
        pub r: f64,
    }
    // @llm-class-end

    // @llm-doc-start
    pub fn area(c: &Circle) -> f64 {
        std::f64::consts::PI * c.r * c.r
    }
    // @llm-doc-end
}
// @llm-module-end
