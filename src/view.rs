//! Drawing driver: owns a surface and keeps it in sync with the latest
//! family tree.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::{SizingConfig, ViewConfig};
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::ir::FamilyTreeData;
use crate::layout::{LayoutPlan, layout_family_tree};
use crate::render::{ContainerId, DrawingSurface, NodeContent, draw_scene};
use crate::routing::{Rect, route};

/// Passed to the render callback once per laid-out node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRequest<'a> {
    pub id: &'a str,
    pub label: &'a str,
    pub rect: Rect,
}

pub type RenderCallback = Box<dyn FnMut(&NodeRequest<'_>) -> Option<NodeContent>>;
pub type RenderedHook = Box<dyn FnMut()>;

pub struct FamilyTreeView<S: DrawingSurface> {
    surface: S,
    sizing: SizingConfig,
    debug_info: bool,
    render_node: RenderCallback,
    on_rendered: Option<RenderedHook>,
    containers: HashMap<String, ContainerId>,
    debouncer: Debouncer<FamilyTreeData>,
    /// Most recent graph handed to `set_family_tree` or `redraw`.
    requested: Option<FamilyTreeData>,
    plan: Option<LayoutPlan>,
    /// Completed draws whose hook waits for the next macrotask boundary.
    awaiting_macrotask: usize,
    /// Completed draws whose hook waits for the next frame.
    awaiting_frame: usize,
}

impl<S: DrawingSurface> FamilyTreeView<S> {
    /// A view that shows each entity's label (or id) in its box.
    pub fn new(surface: S, sizing: SizingConfig, view: &ViewConfig) -> Self {
        Self::with_renderer(
            surface,
            sizing,
            view,
            Box::new(|request: &NodeRequest<'_>| {
                Some(NodeContent::titled(request.label))
            }),
        )
    }

    pub fn with_renderer(
        surface: S,
        sizing: SizingConfig,
        view: &ViewConfig,
        render_node: RenderCallback,
    ) -> Self {
        Self {
            surface,
            sizing,
            debug_info: view.debug_info,
            render_node,
            on_rendered: None,
            containers: HashMap::new(),
            debouncer: Debouncer::new(Duration::from_millis(view.debounce_ms)),
            requested: None,
            plan: None,
            awaiting_macrotask: 0,
            awaiting_frame: 0,
        }
    }

    pub fn set_on_rendered(&mut self, hook: RenderedHook) {
        self.on_rendered = Some(hook);
    }

    pub fn set_debug_info(&mut self, debug_info: bool) {
        self.debug_info = debug_info;
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Plan behind the current drawing, `None` before the first draw or
    /// after drawing an empty graph.
    pub fn plan(&self) -> Option<&LayoutPlan> {
        self.plan.as_ref()
    }

    pub fn is_redraw_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn time_until_redraw(&self, now: Instant) -> Option<Duration> {
        self.debouncer.time_until_ready(now)
    }

    /// Requests a redraw with `graph` once the debounce period has passed.
    /// A graph equal to the last one requested is ignored.
    pub fn set_family_tree(&mut self, graph: FamilyTreeData, now: Instant) {
        if self.requested.as_ref() == Some(&graph) {
            return;
        }
        self.requested = Some(graph.clone());
        self.debouncer.schedule(graph, now);
    }

    /// Runs the pending redraw if it is due. Returns whether a draw happened.
    pub fn tick(&mut self, now: Instant) -> Result<bool> {
        match self.debouncer.poll(now) {
            Some(graph) => self.redraw(&graph).map(|()| true),
            None => Ok(false),
        }
    }

    /// Runs the pending redraw now, if any.
    pub fn flush(&mut self) -> Result<bool> {
        match self.debouncer.flush() {
            Some(graph) => self.redraw(&graph).map(|()| true),
            None => Ok(false),
        }
    }

    /// Clears the surface and draws `graph` from scratch. A pending debounced
    /// redraw is dropped and `graph` becomes the last requested graph.
    ///
    /// On error the previous drawing is left untouched.
    pub fn redraw(&mut self, graph: &FamilyTreeData) -> Result<()> {
        let plan = layout_family_tree(graph)?;
        self.debouncer.cancel();
        if self.requested.as_ref() != Some(graph) {
            self.requested = Some(graph.clone());
        }
        self.surface.clear();
        self.containers.clear();

        if let Some(plan) = &plan {
            let scene = route(plan, &self.sizing, self.debug_info);
            draw_scene(&mut self.surface, &scene);
            for node in &scene.nodes {
                let request = NodeRequest {
                    id: &node.id,
                    label: graph.label_for(&node.id),
                    rect: node.rect,
                };
                let Some(content) = (self.render_node)(&request) else {
                    continue;
                };
                let container = self.surface.embed(&node.id, &node.rect, content);
                self.containers.insert(node.id.clone(), container);
            }
            debug!(
                nodes = plan.node_count(),
                connectors = scene.connectors.len(),
                containers = self.containers.len(),
                "family tree drawn"
            );
        } else {
            self.surface.set_size(0.0, 0.0, (0.0, 0.0, 0.0, 0.0));
        }

        self.plan = plan;
        self.awaiting_macrotask += 1;
        Ok(())
    }

    /// Brings the entity's container into view. False if the last draw has
    /// no container for `id`.
    pub fn scroll_to_entity(&mut self, id: &str) -> bool {
        match self.containers.get(id) {
            Some(&container) => {
                self.surface.scroll_into_view(container);
                true
            }
            None => {
                warn!(entity = %id, "cannot scroll to an entity that is not drawn");
                false
            }
        }
    }

    /// Marks a macrotask boundary: completed draws now wait for a frame.
    pub fn run_macrotasks(&mut self) {
        self.awaiting_frame += std::mem::take(&mut self.awaiting_macrotask);
    }

    /// Marks a frame boundary and fires the post-render hook once for each
    /// draw that has passed a macrotask boundary. Returns how many fired.
    pub fn on_animation_frame(&mut self) -> usize {
        let ready = std::mem::take(&mut self.awaiting_frame);
        if let Some(hook) = self.on_rendered.as_mut() {
            for _ in 0..ready {
                hook();
            }
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Connector;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        clears: usize,
        rects: usize,
        polylines: usize,
        texts: usize,
        embedded: Vec<String>,
        scrolled: Vec<ContainerId>,
    }

    impl DrawingSurface for RecordingSurface {
        fn clear(&mut self) {
            self.clears += 1;
            self.rects = 0;
            self.polylines = 0;
            self.texts = 0;
            self.embedded.clear();
        }

        fn set_size(&mut self, _width: f32, _height: f32, _view_box: (f32, f32, f32, f32)) {}

        fn draw_rect(&mut self, _rect: &Rect) {
            self.rects += 1;
        }

        fn draw_polyline(&mut self, _connector: &Connector) {
            self.polylines += 1;
        }

        fn draw_text(&mut self, _x: f32, _y: f32, _lines: &[String]) {
            self.texts += 1;
        }

        fn embed(&mut self, id: &str, _rect: &Rect, _content: NodeContent) -> ContainerId {
            self.embedded.push(id.to_string());
            self.embedded.len() - 1
        }

        fn scroll_into_view(&mut self, container: ContainerId) {
            self.scrolled.push(container);
        }
    }

    fn family() -> FamilyTreeData {
        let mut graph = FamilyTreeData::new();
        graph
            .add_root("A")
            .add_root("C")
            .add_mates("A", "C")
            .add_child("A", Some("C"), "B");
        graph
    }

    fn view() -> FamilyTreeView<RecordingSurface> {
        FamilyTreeView::new(
            RecordingSurface::default(),
            SizingConfig::default(),
            &ViewConfig::default(),
        )
    }

    #[test]
    fn redraw_waits_for_quiet_period() {
        let start = Instant::now();
        let mut view = view();
        view.set_family_tree(family(), start);
        assert!(!view.tick(start + Duration::from_millis(50)).unwrap());
        assert_eq!(view.surface().clears, 0);
        assert!(view.tick(start + Duration::from_millis(100)).unwrap());
        assert_eq!(view.surface().clears, 1);
        assert_eq!(view.surface().rects, 3);
        assert_eq!(view.surface().polylines, 2);
        assert_eq!(view.surface().embedded.len(), 3);
        assert_eq!(view.surface().texts, 0);
    }

    #[test]
    fn debug_overlay_draws_text_per_node() {
        let mut view = view();
        view.set_debug_info(true);
        view.redraw(&family()).unwrap();
        assert_eq!(view.surface().texts, 3);
    }

    #[test]
    fn unchanged_graph_is_ignored() {
        let start = Instant::now();
        let mut view = view();
        view.set_family_tree(family(), start);
        assert!(view.flush().unwrap());
        view.set_family_tree(family(), start);
        assert!(!view.is_redraw_pending());
    }

    #[test]
    fn direct_redraw_replaces_the_last_request() {
        let start = Instant::now();
        let mut other = FamilyTreeData::new();
        other.add_root("Solo");

        let mut view = view();
        view.set_family_tree(family(), start);
        view.flush().unwrap();
        view.redraw(&other).unwrap();
        assert_eq!(view.surface().rects, 1);

        view.set_family_tree(family(), start);
        assert!(view.is_redraw_pending());
        assert!(view.flush().unwrap());
        assert_eq!(view.surface().rects, 3);
    }

    #[test]
    fn direct_redraw_drops_pending_request() {
        let start = Instant::now();
        let mut other = FamilyTreeData::new();
        other.add_root("Solo");

        let mut view = view();
        view.set_family_tree(family(), start);
        view.redraw(&other).unwrap();
        assert!(!view.is_redraw_pending());
        assert!(!view.tick(start + Duration::from_millis(100)).unwrap());
        assert_eq!(view.surface().rects, 1);
    }

    #[test]
    fn scroll_only_to_drawn_entities() {
        let mut view = view();
        view.set_family_tree(family(), Instant::now());
        view.flush().unwrap();
        assert!(view.scroll_to_entity("B"));
        assert!(!view.scroll_to_entity("Z"));
        assert_eq!(view.surface().scrolled.len(), 1);
    }

    #[test]
    fn callback_may_skip_nodes() {
        let mut view = FamilyTreeView::with_renderer(
            RecordingSurface::default(),
            SizingConfig::default(),
            &ViewConfig::default(),
            Box::new(|request: &NodeRequest<'_>| (request.id != "C").then(|| NodeContent::titled(request.id))),
        );
        view.set_family_tree(family(), Instant::now());
        view.flush().unwrap();
        let mut embedded = view.surface().embedded.clone();
        embedded.sort();
        assert_eq!(embedded, vec!["A".to_string(), "B".to_string()]);
        assert!(!view.scroll_to_entity("C"));
    }

    #[test]
    fn hook_fires_once_per_draw_after_both_boundaries() {
        let fired = Rc::new(Cell::new(0));
        let mut view = view();
        let counter = Rc::clone(&fired);
        view.set_on_rendered(Box::new(move || counter.set(counter.get() + 1)));

        view.redraw(&family()).unwrap();
        assert_eq!(view.on_animation_frame(), 0);
        view.run_macrotasks();
        assert_eq!(fired.get(), 0);
        assert_eq!(view.on_animation_frame(), 1);
        assert_eq!(fired.get(), 1);
        view.run_macrotasks();
        assert_eq!(view.on_animation_frame(), 0);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn empty_graph_leaves_empty_surface() {
        let mut view = view();
        view.redraw(&family()).unwrap();
        view.redraw(&FamilyTreeData::new()).unwrap();
        assert!(view.plan().is_none());
        assert_eq!(view.surface().rects, 0);
        assert!(!view.scroll_to_entity("A"));
    }

    #[test]
    fn invalid_graph_keeps_previous_drawing() {
        let mut view = view();
        view.redraw(&family()).unwrap();
        let mut bad = FamilyTreeData::new();
        bad.add_root("");
        assert!(view.redraw(&bad).is_err());
        assert_eq!(view.surface().rects, 3);
        assert!(view.scroll_to_entity("A"));
    }
}
