//! TOML project files: board size, extra footprints, components,
//! connections, labels and the intended net-list.

use crate::db::core::{BoardDB, Component, Connection, NetLabel};
use crate::db::error::DbError;
use crate::db::footprint::{Catalog, Footprint, Library};
use crate::db::netlist::{NetDef, NetList};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Serialize, Deserialize)]
struct BoardSection {
    width: i32,
    height: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    board: BoardSection,
    #[serde(default)]
    footprints: Vec<Footprint>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    connections: Vec<Connection>,
    #[serde(default)]
    labels: Vec<NetLabel>,
    #[serde(default)]
    nets: Vec<NetDef>,
}

pub struct Project {
    pub db: BoardDB,
    pub library: Library,
    pub netlist: NetList,
}

/// Footprints declared in the file extend (and override) the standard set.
pub fn parse_str(text: &str) -> Result<Project, DbError> {
    let file: ProjectFile = toml::from_str(text)?;

    let mut library = Library::standard();
    for fp in file.footprints {
        library.insert(fp);
    }

    let db = BoardDB {
        width: file.board.width,
        height: file.board.height,
        components: file.components,
        connections: file.connections,
        labels: file.labels,
    };

    log::debug!(
        "Project: {}x{} board, {} components, {} connections, {} nets",
        db.width,
        db.height,
        db.components.len(),
        db.connections.len(),
        file.nets.len()
    );

    Ok(Project {
        db,
        library,
        netlist: NetList::new(file.nets),
    })
}

pub fn parse(path: &str) -> Result<Project, DbError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

pub fn to_string(project: &Project) -> Result<String, DbError> {
    let standard = Library::standard();
    let custom: Vec<Footprint> = project
        .library
        .footprints()
        .into_iter()
        .filter(|fp| standard.footprint(&fp.name) != Some(*fp))
        .cloned()
        .collect();

    let file = ProjectFile {
        board: BoardSection {
            width: project.db.width,
            height: project.db.height,
        },
        footprints: custom,
        components: project.db.components.clone(),
        connections: project.db.connections.clone(),
        labels: project.db.labels.clone(),
        nets: project.netlist.nets.clone(),
    };
    Ok(toml::to_string(&file)?)
}

pub fn save(project: &Project, path: &str) -> Result<(), DbError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, to_string(project)?)?;
    Ok(())
}
