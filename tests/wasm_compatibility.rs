#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use oxflow::render::render_svg;
    use oxflow::{EditorConfig, Point, Scene, SequentialIds, to_mermaid};
    use wasm_bindgen_test::*;

    fn scene() -> Scene {
        let config = EditorConfig::default();
        let mut scene = Scene::with_id_generator(&config, Box::<SequentialIds>::default());
        scene
            .insert_node("A", "Start", Point::new(100.0, 100.0))
            .expect("Failed to insert node");
        scene
            .insert_node("B", "Great!", Point::new(100.0, 300.0))
            .expect("Failed to insert node");
        scene.add_link("A", "B").expect("Failed to add link");
        scene
    }

    #[wasm_bindgen_test]
    fn test_scene_serializes() {
        let mermaid = to_mermaid(&scene(), "TD");
        assert!(mermaid.starts_with("graph TD\n"));
        assert!(mermaid.contains("A --> B"));
    }

    #[wasm_bindgen_test]
    fn test_scene_renders_svg() {
        let config = EditorConfig::default();
        let render = oxflow::render::project(&scene(), &config, &Default::default());
        let svg = render_svg(&render, &config, "white").expect("Failed to render SVG");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("viewBox"));
        assert!(svg.contains("Great!"));
    }
}
