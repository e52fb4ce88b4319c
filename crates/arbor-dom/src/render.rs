//! Render state and the renderer adapter
//!
//! Render state is opaque layout-adjacent data cached per node in a
//! three-state slot. It is stamped with the document style generation, so a
//! style sheet change makes every slot stale at once.

use crate::NodeId;
use crate::bus::DocumentEvent;
use crate::document::{Document, TreeState};
use crate::error::Result;
use crate::generation::Generation;
use arbor_css::StyleProperties;
use std::sync::Arc;

/// Derived per-node data consumed by a renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    /// Computed style, for elements
    pub style: Option<Arc<StyleProperties>>,
    pub depth: usize,
    pub index_in_parent: usize,
    pub child_count: usize,
    pub descendant_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    Uncomputed,
    Computed,
    Invalidated,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum RenderSlot {
    #[default]
    Uncomputed,
    Computed {
        state: Arc<RenderState>,
        style_generation: Generation,
    },
    Invalidated,
}

impl RenderSlot {
    pub fn invalidate(&mut self) {
        if matches!(self, RenderSlot::Computed { .. }) {
            *self = RenderSlot::Invalidated;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Renderer-side handle attached to a node
pub trait UiNode: Send + Sync {
    fn repaint(&self);
    fn bounds(&self) -> Bounds;
    fn focus(&self);
    fn blur(&self);
}

impl TreeState {
    pub(crate) fn forget_render(&mut self, id: NodeId, deep: bool) {
        let targets = if deep { self.subtree(id) } else { vec![id] };
        for t in targets {
            if let Some(node) = self.tree.get_mut(t) {
                node.render.invalidate();
            }
        }
    }

    /// Clears `id` deeply and each ancestor shallowly
    pub(crate) fn forget_render_upward(&mut self, id: NodeId) {
        self.forget_render(id, true);
        for a in self.ancestors(id) {
            self.forget_render(a, false);
        }
    }

    fn render_status(&self, id: NodeId) -> Result<RenderStatus> {
        Ok(match &self.node(id)?.render {
            RenderSlot::Uncomputed => RenderStatus::Uncomputed,
            RenderSlot::Computed {
                style_generation, ..
            } if *style_generation == self.style_generation => RenderStatus::Computed,
            _ => RenderStatus::Invalidated,
        })
    }
}

impl Document {
    /// Render state of `id`, or `None` when it is not attached to the
    /// document.
    pub fn render_state(&self, id: NodeId) -> Result<Option<Arc<RenderState>>> {
        let mut state = self.lock();
        let generation = state.style_generation;
        let node = state.node(id)?;
        if let RenderSlot::Computed {
            state: cached,
            style_generation,
        } = &node.render
        {
            if *style_generation == generation {
                return Ok(Some(Arc::clone(cached)));
            }
        }
        if !state.is_connected(id) {
            return Ok(None);
        }

        let is_element = node.is_element();
        let child_count = node.children.len();
        let parent = node.parent;
        let style = if is_element {
            Some(state.computed_style(id, None, self.shared.parser.as_ref())?)
        } else {
            None
        };
        let index_in_parent = parent
            .and_then(|p| state.tree.get(p))
            .and_then(|p| p.children.iter().position(|c| *c == id))
            .unwrap_or(0);

        let render = Arc::new(RenderState {
            style,
            depth: state.ancestors(id).len(),
            index_in_parent,
            child_count,
            descendant_count: state.descendants(id).len(),
        });
        state.node_mut(id)?.render = RenderSlot::Computed {
            state: Arc::clone(&render),
            style_generation: generation,
        };
        Ok(Some(render))
    }

    pub fn render_state_status(&self, id: NodeId) -> Result<RenderStatus> {
        self.lock().render_status(id)
    }

    pub fn set_ui_node(&self, id: NodeId, ui: Arc<dyn UiNode>) -> Result<()> {
        let replaced = {
            let mut state = self.lock();
            state.node(id)?;
            state.ui.insert(id, ui)
        };
        drop(replaced);
        Ok(())
    }

    pub fn clear_ui_node(&self, id: NodeId) -> Option<Arc<dyn UiNode>> {
        self.lock().ui.remove(&id)
    }

    fn ui_node(&self, id: NodeId) -> Result<Option<Arc<dyn UiNode>>> {
        let state = self.lock();
        state.node(id)?;
        Ok(state.ui.get(&id).cloned())
    }

    /// Focuses the node's UI handle. Returns whether one was attached.
    pub fn focus(&self, id: NodeId) -> Result<bool> {
        let ui = self.ui_node(id)?;
        if let Some(ui) = &ui {
            ui.focus();
        }
        Ok(ui.is_some())
    }

    pub fn blur(&self, id: NodeId) -> Result<bool> {
        let ui = self.ui_node(id)?;
        if let Some(ui) = &ui {
            ui.blur();
        }
        Ok(ui.is_some())
    }

    pub fn bounds(&self, id: NodeId) -> Result<Option<Bounds>> {
        Ok(self.ui_node(id)?.map(|ui| ui.bounds()))
    }

    pub fn inform_size_invalid(&self, id: NodeId) -> Result<()> {
        self.mutate(|state, fx| {
            state.node(id)?;
            if !state.is_suspended(id) {
                state.forget_render_upward(id);
                fx.push(DocumentEvent::SizeInvalidated(id));
            }
            Ok(())
        })
    }

    /// Reports a visual change; the node's UI handle is repainted after
    /// listeners have run.
    pub fn inform_look_invalid(&self, id: NodeId) -> Result<()> {
        self.mutate(|state, fx| {
            state.node(id)?;
            if !state.is_suspended(id) {
                state.forget_render(id, false);
                fx.push(DocumentEvent::LookInvalidated(id));
                if let Some(ui) = state.ui.get(&id) {
                    fx.repaint.push(Arc::clone(ui));
                }
            }
            Ok(())
        })
    }

    pub fn inform_position_invalid(&self, id: NodeId) -> Result<()> {
        self.mutate(|state, fx| {
            state.node(id)?;
            if !state.is_suspended(id) {
                state.forget_render(id, true);
                fx.push(DocumentEvent::PositionInvalidated(id));
            }
            Ok(())
        })
    }
}
