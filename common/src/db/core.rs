use crate::db::error::DbError;
use crate::db::footprint::{Catalog, Footprint, Placement};
use crate::db::indices::*;
use crate::geom::coord::{Edge, GridPos};
use crate::geom::polyline;
use crate::geom::rect::GridRect;
use crate::geom::segment::Segment;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Copper side a connection lives on. Schematic sheets only use `Top`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Top,
    Bottom,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub id: ConnectionId,
    #[serde(default)]
    pub side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    pub points: Vec<GridPos>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bridge {
    pub id: ConnectionId,
    #[serde(default)]
    pub side: Side,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    pub a: GridPos,
    pub b: GridPos,
}

/// A routed wire or a zero-length bridge; never both for the same pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Connection {
    Wire(Wire),
    Bridge(Bridge),
}

impl Connection {
    pub fn wire(id: ConnectionId, side: Side, points: Vec<GridPos>) -> Self {
        Connection::Wire(Wire {
            id,
            side,
            net: None,
            points,
        })
    }

    pub fn bridge(id: ConnectionId, side: Side, a: GridPos, b: GridPos) -> Self {
        Connection::Bridge(Bridge {
            id,
            side,
            net: None,
            a,
            b,
        })
    }

    pub fn id(&self) -> ConnectionId {
        match self {
            Connection::Wire(w) => w.id,
            Connection::Bridge(b) => b.id,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Connection::Wire(w) => w.side,
            Connection::Bridge(b) => b.side,
        }
    }

    pub fn net(&self) -> Option<&str> {
        match self {
            Connection::Wire(w) => w.net.as_deref(),
            Connection::Bridge(b) => b.net.as_deref(),
        }
    }

    pub fn with_net(mut self, net: Option<String>) -> Self {
        match &mut self {
            Connection::Wire(w) => w.net = net,
            Connection::Bridge(b) => b.net = net,
        }
        self
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self, Connection::Bridge(_))
    }

    /// First and last point.
    pub fn endpoints(&self) -> (GridPos, GridPos) {
        match self {
            Connection::Wire(w) => (
                w.points.first().copied().unwrap_or_default(),
                w.points.last().copied().unwrap_or_default(),
            ),
            Connection::Bridge(b) => (b.a, b.b),
        }
    }

    pub fn has_endpoint(&self, p: GridPos) -> bool {
        let (a, b) = self.endpoints();
        a == p || b == p
    }

    /// Vertex list; a bridge is a two-point polyline.
    pub fn points(&self) -> Vec<GridPos> {
        match self {
            Connection::Wire(w) => w.points.clone(),
            Connection::Bridge(b) => vec![b.a, b.b],
        }
    }

    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Connection::Wire(w) => polyline::segments(&w.points).collect(),
            Connection::Bridge(b) => vec![Segment::new(b.a, b.b)],
        }
    }

    pub fn cells(&self) -> Vec<GridPos> {
        match self {
            Connection::Wire(w) => polyline::cells(&w.points),
            Connection::Bridge(b) => vec![b.a, b.b],
        }
    }

    pub fn edges(&self) -> Vec<Edge> {
        match self {
            Connection::Wire(w) => polyline::unit_edges(&w.points),
            Connection::Bridge(b) => Edge::new(b.a, b.b).into_iter().collect(),
        }
    }
}

/// Named label; every label with the same name is one net.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetLabel {
    pub name: String,
    pub at: GridPos,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub footprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
}

/// A component pin resolved to its current grid position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinSite {
    pub component: ComponentId,
    pub pin: String,
    pub pos: GridPos,
}

/// Edits the engine hands back to the owner of the board for atomic apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    AddConnection(Connection),
    ReplaceConnection(Connection),
    RemoveConnection(ConnectionId),
    PlaceComponent {
        component: ComponentId,
        placement: Placement,
    },
}

/// Snapshot of one board or sheet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BoardDB {
    pub width: i32,
    pub height: i32,
    pub components: Vec<Component>,
    pub connections: Vec<Connection>,
    pub labels: Vec<NetLabel>,
}

impl BoardDB {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            components: Vec::new(),
            connections: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn bounds(&self) -> GridRect {
        GridRect::from_size(GridPos::new(0, 0), self.width.max(1), self.height.max(1))
    }

    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    pub fn add_component(&mut self, name: &str, footprint: &str, placement: Option<Placement>) -> ComponentId {
        let id = ComponentId::new(
            self.components
                .iter()
                .map(|c| c.id.index() + 1)
                .max()
                .unwrap_or(0),
        );
        self.components.push(Component {
            id,
            name: name.to_string(),
            footprint: footprint.to_string(),
            placement,
        });
        id
    }

    pub fn add_label(&mut self, name: &str, at: GridPos) {
        self.labels.push(NetLabel {
            name: name.to_string(),
            at,
        });
    }

    pub fn component(&self, id: ComponentId) -> Result<&Component, DbError> {
        self.components
            .iter()
            .find(|c| c.id == id)
            .ok_or(DbError::UnknownComponent(id))
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Result<&mut Component, DbError> {
        self.components
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DbError::UnknownComponent(id))
    }

    pub fn component_by_name(&self, name: &str) -> Result<&Component, DbError> {
        self.components
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| DbError::UnknownComponentName(name.to_string()))
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id() == id)
    }

    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(
            self.connections
                .iter()
                .map(|c| c.id().index() + 1)
                .max()
                .unwrap_or(0),
        )
    }

    pub fn footprint_of<'c, C: Catalog + ?Sized>(
        &self,
        id: ComponentId,
        catalog: &'c C,
    ) -> Result<&'c Footprint, DbError> {
        let comp = self.component(id)?;
        catalog
            .footprint(&comp.footprint)
            .ok_or_else(|| DbError::UnknownFootprint(comp.footprint.clone()))
    }

    /// Pin positions of a component; empty when it is not placed.
    pub fn pin_positions<C: Catalog + ?Sized>(
        &self,
        id: ComponentId,
        catalog: &C,
    ) -> Result<Vec<(String, GridPos)>, DbError> {
        let comp = self.component(id)?;
        let Some(placement) = comp.placement else {
            return Ok(Vec::new());
        };
        Ok(self.footprint_of(id, catalog)?.pin_positions(&placement))
    }

    pub fn pin_position<C: Catalog + ?Sized>(
        &self,
        id: ComponentId,
        pin: &str,
        catalog: &C,
    ) -> Result<Option<GridPos>, DbError> {
        Ok(self
            .pin_positions(id, catalog)?
            .into_iter()
            .find(|(n, _)| n == pin)
            .map(|(_, p)| p))
    }

    /// Every pin of every placed component, in component order.
    pub fn pin_sites<C: Catalog + ?Sized>(&self, catalog: &C) -> Result<Vec<PinSite>, DbError> {
        let mut sites = Vec::new();
        for comp in &self.components {
            for (pin, pos) in self.pin_positions(comp.id, catalog)? {
                sites.push(PinSite {
                    component: comp.id,
                    pin,
                    pos,
                });
            }
        }
        Ok(sites)
    }

    /// Rejects a placement whose body leaves the board, overlaps another
    /// body, covers another component's pin, or puts a pin inside another
    /// body. Pins may coincide with pins: that is an implicit connection.
    pub fn check_placement<C: Catalog + ?Sized>(
        &self,
        catalog: &C,
        id: ComponentId,
        placement: &Placement,
    ) -> Result<(), DbError> {
        let comp = self.component(id)?;
        let fp = self.footprint_of(id, catalog)?;
        let body = fp.body_rect(placement);
        let pins = fp.pin_positions(placement);
        let blocked = |reason: String| DbError::PlacementBlocked {
            component: comp.name.clone(),
            anchor: placement.anchor,
            reason,
        };

        let bounds = self.bounds();
        if !bounds.contains_rect(&fp.bbox(placement)) {
            return Err(blocked("outside the board".to_string()));
        }

        for other in &self.components {
            if other.id == id {
                continue;
            }
            let Some(other_placement) = other.placement else {
                continue;
            };
            let other_fp = self.footprint_of(other.id, catalog)?;
            let other_body = other_fp.body_rect(&other_placement);
            let other_pins: HashSet<GridPos> = other_fp
                .pin_positions(&other_placement)
                .into_iter()
                .map(|(_, p)| p)
                .collect();
            let own_pins: HashSet<GridPos> = pins.iter().map(|(_, p)| *p).collect();

            if other_pins.iter().any(|q| body.contains(*q) && !own_pins.contains(q)) {
                return Err(blocked(format!("body covers a pin of '{}'", other.name)));
            }
            if own_pins.iter().any(|p| other_body.contains(*p) && !other_pins.contains(p)) {
                return Err(blocked(format!("pin lands inside '{}'", other.name)));
            }
            let shared = body
                .intersection(&other_body)
                .map(|x| x.cells().any(|c| !(own_pins.contains(&c) && other_pins.contains(&c))))
                .unwrap_or(false);
            if shared {
                return Err(blocked(format!("body overlaps '{}'", other.name)));
            }
        }
        Ok(())
    }

    /// Applies the whole list or nothing.
    pub fn apply(&mut self, mutations: &[Mutation]) -> Result<(), DbError> {
        let mut next = self.clone();
        for m in mutations {
            next.apply_one(m)?;
        }
        *self = next;
        Ok(())
    }

    fn apply_one(&mut self, mutation: &Mutation) -> Result<(), DbError> {
        match mutation {
            Mutation::AddConnection(conn) => {
                validate_connection(conn)?;
                if self.connection(conn.id()).is_some() {
                    return Err(DbError::DuplicateConnection(conn.id()));
                }
                self.connections.push(conn.clone());
            }
            Mutation::ReplaceConnection(conn) => {
                validate_connection(conn)?;
                let slot = self
                    .connections
                    .iter_mut()
                    .find(|c| c.id() == conn.id())
                    .ok_or(DbError::UnknownConnection(conn.id()))?;
                *slot = conn.clone();
            }
            Mutation::RemoveConnection(id) => {
                let idx = self
                    .connections
                    .iter()
                    .position(|c| c.id() == *id)
                    .ok_or(DbError::UnknownConnection(*id))?;
                self.connections.remove(idx);
            }
            Mutation::PlaceComponent {
                component,
                placement,
            } => {
                self.component_mut(*component)?.placement = Some(*placement);
            }
        }
        Ok(())
    }
}

fn validate_connection(conn: &Connection) -> Result<(), DbError> {
    let invalid = |reason: &str| DbError::InvalidConnection {
        id: conn.id(),
        reason: reason.to_string(),
    };
    match conn {
        Connection::Wire(w) => {
            if w.points.len() < 2 {
                return Err(invalid("a wire needs at least two points"));
            }
            if !polyline::is_rectilinear(&w.points) {
                return Err(invalid("wire is not rectilinear"));
            }
        }
        Connection::Bridge(b) => {
            if b.a.manhattan(b.b) != 1 {
                return Err(invalid("bridge endpoints must be adjacent"));
            }
        }
    }
    Ok(())
}
