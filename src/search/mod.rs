//! Tantivy-based search index module.
//!
//! Provides full-text search over topics and their replies with field boosting.
//! The index lives in RAM and is rebuilt from the forum state at startup.

use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::Topic;

const BOOST_TITLE: f32 = 10.0;
const BOOST_TAGS: f32 = 6.0;
const BOOST_BODY: f32 = 4.0;
const BOOST_REPLIES: f32 = 1.5;

/// A topic together with the reply bodies that should be searchable.
#[derive(Debug, Clone)]
pub struct SearchDocument {
    pub topic: Topic,
    pub replies: Vec<String>,
}

/// Search result with topic and relevance score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub topic_id: String,
    pub score: f32,
}

struct SearchFields {
    topic_id: Field,
    title: Field,
    body: Field,
    tags: Field,
    category: Field,
    replies: Field,
}

/// Tantivy search index for topics.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
}

impl SearchIndex {
    /// Create an empty in-memory index.
    pub fn in_memory() -> Result<Self, AppError> {
        let mut schema_builder = Schema::builder();
        // STRING so the id is indexed untokenized and delete_term can find it.
        let topic_id = schema_builder.add_text_field("topic_id", STRING | STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let body = schema_builder.add_text_field("body", TEXT);
        let tags = schema_builder.add_text_field("tags", TEXT);
        let category = schema_builder.add_text_field("category", TEXT);
        let replies = schema_builder.add_text_field("replies", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            topic_id,
            title,
            body,
            tags,
            category,
            replies,
        };

        let index = Index::create_in_ram(schema);

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(15_000_000)
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
        })
    }

    /// Rebuild the entire index.
    pub async fn rebuild(&self, documents: &[SearchDocument]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for document in documents {
            writer.add_document(self.create_document(document))?;
        }
        writer.commit()?;
        self.reader.reload()?;

        tracing::info!("Search index rebuilt with {} topics", documents.len());
        Ok(())
    }

    /// Index a single topic, replacing any earlier version.
    pub async fn index_topic(&self, document: &SearchDocument) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.topic_id, &document.topic.id));
        writer.add_document(self.create_document(document))?;
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Remove a topic from the index.
    pub async fn remove_topic(&self, topic_id: &str) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_term(Term::from_field_text(self.fields.topic_id, topic_id));
        writer.commit()?;
        self.reader.reload()?;

        Ok(())
    }

    /// Search for topics matching the query.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SearchResult>, AppError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.tags, BOOST_TAGS),
            (self.fields.body, BOOST_BODY),
            (self.fields.category, BOOST_BODY),
            (self.fields.replies, BOOST_REPLIES),
        ];

        let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        // Nothing parsed per field: surface the parser error for the whole query.
        let query: Box<dyn Query> = if subqueries.is_empty() {
            QueryParser::for_index(&self.index, field_queries.iter().map(|(f, _)| *f).collect())
                .parse_query(query_str)
                .map_err(|e| AppError::Search(format!("Invalid search query: {}", e)))?
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit + offset))
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let results = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let doc: TantivyDocument = searcher.doc(doc_address).ok()?;
                let topic_id = doc.get_first(self.fields.topic_id)?.as_str()?.to_string();
                Some(SearchResult { topic_id, score })
            })
            .collect();

        Ok(results)
    }

    fn create_document(&self, document: &SearchDocument) -> TantivyDocument {
        let topic = &document.topic;
        let tags: Vec<&str> = topic.tags.iter().map(String::as_str).collect();

        doc!(
            self.fields.topic_id => topic.id.clone(),
            self.fields.title => topic.title.clone(),
            self.fields.body => topic.body.clone(),
            self.fields.tags => tags.join(" "),
            self.fields.category => topic.category_id.replace('-', " "),
            self.fields.replies => document.replies.join("\n")
        )
    }
}
