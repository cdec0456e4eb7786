//! Relationship linking: resolve edge endpoints by key and create edges

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use super::batch::{BatchReport, CommitPolicy, Committer};
use super::dataset::{MovieRow, RatingRow, TagRow};
use super::schema::{GENRE, MOVIE, USER};
use crate::error::{ImportError, ImportResult};
use crate::graph::{property_map, EdgeType, Label, NodeId, PropertyMap, PropertyValue};
use crate::session::{GraphSession, SessionError};

/// What to do with an edge whose endpoint cannot be found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Skip the edge and count it
    #[default]
    Lenient,
    /// Abort the stage
    Strict,
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(LinkMode::Lenient),
            "strict" => Ok(LinkMode::Strict),
            other => Err(format!("unknown link mode '{}', expected lenient or strict", other)),
        }
    }
}

/// A vertex identified by the value of a key property
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub label: Label,
    pub key: String,
    pub value: PropertyValue,
}

impl Endpoint {
    pub fn new(label: &str, key: &str, value: impl Into<PropertyValue>) -> Self {
        Self {
            label: Label::new(label),
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Edges one source row asks for: all leave `source`, one per target
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRequest {
    pub source: Endpoint,
    pub targets: Vec<(Endpoint, PropertyMap)>,
}

/// Movie to each of its genres
pub fn genre_links(row: &MovieRow) -> LinkRequest {
    LinkRequest {
        source: Endpoint::new(MOVIE, "movieId", row.movie_id),
        targets: row
            .genres
            .iter()
            .map(|genre| (Endpoint::new(GENRE, "name", genre.as_str()), PropertyMap::new()))
            .collect(),
    }
}

/// User to the movie they rated
pub fn rating_link(row: &RatingRow) -> LinkRequest {
    LinkRequest {
        source: Endpoint::new(USER, "userId", row.user_id),
        targets: vec![(
            Endpoint::new(MOVIE, "movieId", row.movie_id),
            property_map([("rating", row.rating.into()), ("timestamp", row.timestamp.into())]),
        )],
    }
}

/// User to the movie they tagged
pub fn tag_link(row: &TagRow) -> LinkRequest {
    LinkRequest {
        source: Endpoint::new(USER, "userId", row.user_id),
        targets: vec![(
            Endpoint::new(MOVIE, "movieId", row.movie_id),
            property_map([
                ("tag", row.tag.as_str().into()),
                ("timestamp", row.timestamp.into()),
            ]),
        )],
    }
}

fn resolve<S: GraphSession + ?Sized>(
    session: &S,
    endpoint: &Endpoint,
) -> Result<Option<NodeId>, SessionError> {
    session.find_vertex(&endpoint.label, &endpoint.key, &endpoint.value)
}

fn unresolved(mode: LinkMode, edge_type: &EdgeType, endpoint: &Endpoint) -> ImportResult<()> {
    match mode {
        LinkMode::Lenient => {
            debug!(
                "Skipping {} edge: no {} with {} = {}",
                edge_type, endpoint.label, endpoint.key, endpoint.value
            );
            Ok(())
        }
        LinkMode::Strict => Err(ImportError::UnresolvedEndpoint {
            edge_type: edge_type.to_string(),
            label: endpoint.label.to_string(),
            key: endpoint.key.clone(),
            value: endpoint.value.to_string(),
        }),
    }
}

/// Create `edge_type` edges for every row, as planned by `plan`.
///
/// Commits tick once per row. A row that asks for no edges is not resolved
/// at all. An unresolved source skips every edge of its row; an unresolved
/// target skips only its own edge.
pub fn link_rows<S, R, I, P>(
    session: &mut S,
    edge_type: &EdgeType,
    rows: I,
    plan: P,
    mode: LinkMode,
    policy: CommitPolicy,
) -> ImportResult<BatchReport>
where
    S: GraphSession + ?Sized,
    I: IntoIterator<Item = ImportResult<R>>,
    P: Fn(&R) -> LinkRequest,
{
    let mut committer = Committer::new(session, policy);

    for row in rows {
        let request = plan(&row?);
        if request.targets.is_empty() {
            committer.tick()?;
            continue;
        }

        match resolve(committer.session(), &request.source)? {
            None => {
                unresolved(mode, edge_type, &request.source)?;
                committer.skip(request.targets.len());
            }
            Some(source) => {
                for (target, properties) in request.targets {
                    let Some(target_id) = resolve(committer.session(), &target)? else {
                        unresolved(mode, edge_type, &target)?;
                        committer.skip(1);
                        continue;
                    };

                    match committer.session().add_edge(source, target_id, edge_type, properties) {
                        Ok(_) => committer.record(),
                        Err(SessionError::Graph(e)) => committer.fail(edge_type.as_str(), &e)?,
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }
        committer.tick()?;
    }

    Ok(committer.finish()?)
}
