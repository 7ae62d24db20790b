use crate::scene::{Link, Node, Scene};

const INDENT: &str = "    ";

/// Emits the scene as a Mermaid flowchart.
///
/// Subgraph blocks come first in creation order, then unassigned nodes, then
/// links. Output depends only on scene state, so repeated calls are
/// byte-identical.
pub fn to_mermaid(scene: &Scene, direction: &str) -> String {
    let comments = comment_lines(scene.comments());
    let anchor = scene
        .single_selected_node()
        .map(|node| node.id.as_str())
        .filter(|_| !comments.is_empty());

    let mut lines = Vec::new();
    if anchor.is_none() {
        lines.extend(comments.iter().map(|line| format!("%% {line}")));
    }
    lines.push(format!("graph {}", direction.trim().to_ascii_uppercase()));

    let push_node = |lines: &mut Vec<String>, node: &Node, indent: &str| {
        lines.push(format_node_line(node, indent));
        if anchor == Some(node.id.as_str()) {
            lines.extend(comments.iter().map(|line| format!("{indent}%% {line}")));
        }
    };

    let nested = format!("{INDENT}{INDENT}");
    for subgraph in scene.subgraphs() {
        lines.push(format!(
            "{INDENT}subgraph {} [\"{}\"]",
            subgraph.id,
            escape_label(&subgraph.title)
        ));
        for node in scene.children_of(&subgraph.id) {
            push_node(&mut lines, node, &nested);
        }
        lines.push(format!("{INDENT}end"));
    }

    for node in scene.nodes() {
        if scene.subgraph_of(&node.id).is_none() {
            push_node(&mut lines, node, INDENT);
        }
    }

    for link in scene.links() {
        if scene.node(&link.source).is_none() || scene.node(&link.target).is_none() {
            continue;
        }
        lines.push(format_link_line(link));
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

/// Mermaid labels only need double quotes neutralised.
pub fn escape_label(text: &str) -> String {
    text.replace('"', "#quot;")
}

fn comment_lines(comments: &str) -> Vec<&str> {
    let trimmed = comments.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().collect()
}

fn format_node_line(node: &Node, indent: &str) -> String {
    format!("{indent}{}[\"{}\"]", node.id, escape_label(&node.text))
}

fn format_link_line(link: &Link) -> String {
    if link.label.is_empty() {
        format!("{INDENT}{} --> {}", link.source, link.target)
    } else {
        format!(
            "{INDENT}{} -- \"{}\" --> {}",
            link.source,
            escape_label(&link.label),
            link.target
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::geometry::{Point, Rect};
    use crate::scene::{LinkKey, SequentialIds};

    fn scene() -> Scene {
        let mut scene =
            Scene::with_id_generator(&EditorConfig::default(), Box::<SequentialIds>::default());
        scene.insert_node("A", "Start Here", Point::new(150.0, 100.0)).unwrap();
        scene
            .insert_node("B", "Go Left or Right?", Point::new(150.0, 250.0))
            .unwrap();
        scene.add_link("A", "B").unwrap();
        scene
    }

    #[test]
    fn emits_header_nodes_and_links() {
        let output = to_mermaid(&scene(), "TD");
        assert_eq!(
            output,
            "graph TD\n    A[\"Start Here\"]\n    B[\"Go Left or Right?\"]\n    A --> B\n"
        );
    }

    #[test]
    fn labels_use_the_dashed_label_form() {
        let mut scene = scene();
        scene.set_link_label(&LinkKey::new("A", "B"), "Yes").unwrap();
        assert!(to_mermaid(&scene, "TD").contains("    A -- \"Yes\" --> B\n"));
    }

    #[test]
    fn quotes_are_escaped_everywhere() {
        let mut scene = scene();
        scene.set_node_text("A", "say \"hi\"").unwrap();
        scene.set_link_label(&LinkKey::new("A", "B"), "\"ok\"").unwrap();
        scene
            .insert_subgraph("SG", "the \"box\"", Rect::from_origin(0.0, 0.0, 300.0, 250.0))
            .unwrap();

        let output = to_mermaid(&scene, "TD");
        assert!(output.contains("A[\"say #quot;hi#quot;\"]"));
        assert!(output.contains("A -- \"#quot;ok#quot;\" --> B"));
        assert!(output.contains("subgraph SG [\"the #quot;box#quot;\"]"));
    }

    #[test]
    fn subgraph_members_are_nested_before_loose_nodes() {
        let mut scene = scene();
        scene
            .insert_subgraph("SG", "Group", Rect::from_origin(0.0, 0.0, 300.0, 250.0))
            .unwrap();
        scene.set_node_subgraph("B", Some("SG")).unwrap();

        let output = to_mermaid(&scene, "lr");
        assert_eq!(
            output,
            "graph LR\n    subgraph SG [\"Group\"]\n        B[\"Go Left or Right?\"]\n    end\n    A[\"Start Here\"]\n    A --> B\n"
        );
    }

    #[test]
    fn comments_precede_header_unless_one_node_is_selected() {
        let mut scene = scene();
        scene.set_comments("first\nsecond\n");
        let output = to_mermaid(&scene, "TD");
        assert!(output.starts_with("%% first\n%% second\ngraph TD\n"));

        scene.select_node("A", false);
        let output = to_mermaid(&scene, "TD");
        assert!(output.starts_with("graph TD\n    A[\"Start Here\"]\n    %% first\n    %% second\n"));
    }

    #[test]
    fn repeated_serialization_is_identical() {
        let scene = scene();
        assert_eq!(to_mermaid(&scene, "TD"), to_mermaid(&scene, "TD"));
    }
}
