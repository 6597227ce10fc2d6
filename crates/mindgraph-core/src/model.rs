//! Graph node and edge types

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Node labels known to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeKind {
    Article,
    User,
    Entity,
    Category,
    Subcategory,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Article,
        NodeKind::User,
        NodeKind::Entity,
        NodeKind::Category,
        NodeKind::Subcategory,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Article => "Article",
            NodeKind::User => "User",
            NodeKind::Entity => "Entity",
            NodeKind::Category => "Category",
            NodeKind::Subcategory => "Subcategory",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A node addressed by its natural key
///
/// A reference does not imply the node exists yet; stores resolve keys when
/// pending mutations are committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeRef {
    pub fn key(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.key)
    }
}

/// Directed relationship names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EdgeKind {
    Viewed,
    ViewedBy,
    Ignored,
    IgnoredBy,
    CategoryOf,
    HasCategory,
    SubcategoryOf,
    HasSubcategory,
    AppearsIn,
    Mentions,
}

impl EdgeKind {
    pub fn name(self) -> &'static str {
        match self {
            EdgeKind::Viewed => "Viewed",
            EdgeKind::ViewedBy => "ViewedBy",
            EdgeKind::Ignored => "Ignored",
            EdgeKind::IgnoredBy => "IgnoredBy",
            EdgeKind::CategoryOf => "CategoryOf",
            EdgeKind::HasCategory => "HasCategory",
            EdgeKind::SubcategoryOf => "SubcategoryOf",
            EdgeKind::HasSubcategory => "HasSubcategory",
            EdgeKind::AppearsIn => "AppearsIn",
            EdgeKind::Mentions => "Mentions",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A relationship together with its named inverse. Links are always written
/// as pairs, so the graph stays symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EdgePair {
    /// user `Viewed` article, article `ViewedBy` user
    Viewed,
    /// user `Ignored` article, article `IgnoredBy` user
    Ignored,
    /// parent `HasCategory` category, category `CategoryOf` parent
    Category,
    /// parent `HasSubcategory` subcategory, subcategory `SubcategoryOf` parent
    Subcategory,
    /// article `Mentions` entity, entity `AppearsIn` article
    Mention,
}

impl EdgePair {
    pub const ALL: [EdgePair; 5] = [
        EdgePair::Viewed,
        EdgePair::Ignored,
        EdgePair::Category,
        EdgePair::Subcategory,
        EdgePair::Mention,
    ];

    pub fn forward(self) -> EdgeKind {
        match self {
            EdgePair::Viewed => EdgeKind::Viewed,
            EdgePair::Ignored => EdgeKind::Ignored,
            EdgePair::Category => EdgeKind::HasCategory,
            EdgePair::Subcategory => EdgeKind::HasSubcategory,
            EdgePair::Mention => EdgeKind::Mentions,
        }
    }

    pub fn inverse(self) -> EdgeKind {
        match self {
            EdgePair::Viewed => EdgeKind::ViewedBy,
            EdgePair::Ignored => EdgeKind::IgnoredBy,
            EdgePair::Category => EdgeKind::CategoryOf,
            EdgePair::Subcategory => EdgeKind::SubcategoryOf,
            EdgePair::Mention => EdgeKind::AppearsIn,
        }
    }
}

/// Language tag for aliases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Language {
    English,
}

impl Language {
    pub fn tag(self) -> &'static str {
        match self {
            Language::English => "en",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PropertyValue {
    Null,
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Option<String>> for PropertyValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(PropertyValue::Null, PropertyValue::Text)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub abstract_text: String,
    pub url: String,
    pub html: Option<String>,
    pub full_text: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub wikidata_id: String,
    pub label: String,
    pub wikidata_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subcategory {
    pub name: String,
}

/// A node to upsert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Node {
    Article(Article),
    User(User),
    Entity(Entity),
    Category(Category),
    Subcategory(Subcategory),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Article(_) => NodeKind::Article,
            Node::User(_) => NodeKind::User,
            Node::Entity(_) => NodeKind::Entity,
            Node::Category(_) => NodeKind::Category,
            Node::Subcategory(_) => NodeKind::Subcategory,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Node::Article(article) => &article.id,
            Node::User(user) => &user.id,
            Node::Entity(entity) => &entity.wikidata_id,
            Node::Category(category) => &category.name,
            Node::Subcategory(subcategory) => &subcategory.name,
        }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::key(self.kind(), self.key())
    }

    /// Non-key properties, in a stable order.
    pub fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        match self {
            Node::Article(article) => vec![
                ("title", article.title.clone().into()),
                ("abstract", article.abstract_text.clone().into()),
                ("url", article.url.clone().into()),
                ("html", article.html.clone().into()),
                ("full_text", article.full_text.clone().into()),
                ("timestamp", article.timestamp.into()),
            ],
            Node::Entity(entity) => vec![
                ("label", entity.label.clone().into()),
                ("wikidata_type", entity.wikidata_type.clone().into()),
            ],
            Node::User(_) | Node::Category(_) | Node::Subcategory(_) => Vec::new(),
        }
    }
}

impl From<Article> for Node {
    fn from(value: Article) -> Self {
        Node::Article(value)
    }
}

impl From<User> for Node {
    fn from(value: User) -> Self {
        Node::User(value)
    }
}

impl From<Entity> for Node {
    fn from(value: Entity) -> Self {
        Node::Entity(value)
    }
}

impl From<Category> for Node {
    fn from(value: Category) -> Self {
        Node::Category(value)
    }
}

impl From<Subcategory> for Node {
    fn from(value: Subcategory) -> Self {
        Node::Subcategory(value)
    }
}
