//! CV improvement workflow: `extract_sections → improve_structure → format_cv → END`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::ChatModel;
use crate::retrieval::CvEmbeddingManager;
use crate::workflow::graph::{CompiledGraph, GraphState, Node, StateGraph, WorkflowError, END};
use crate::workflow::prompts::{
    fill_template, FORMAT_CV_PROMPT, IMPROVE_STRUCTURE_PROMPT, SECTION_QUERIES,
};

pub const EXTRACT_SECTIONS: &str = "extract_sections";
pub const IMPROVE_STRUCTURE: &str = "improve_structure";
pub const FORMAT_CV: &str = "format_cv";

const SECTION_RETRIEVER_K: usize = 10;
const DOCS_PER_SECTION: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImproveCvState {
    pub cv_content: String,
    pub feedback: String,
    pub cv_file_path: String,
    pub improved_cv: String,
    pub cv_sections: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct ImproveCvUpdate {
    pub cv_sections: Option<BTreeMap<String, String>>,
    pub improved_cv: Option<String>,
}

impl GraphState for ImproveCvState {
    type Update = ImproveCvUpdate;

    fn apply(&mut self, update: ImproveCvUpdate) {
        if let Some(v) = update.cv_sections {
            self.cv_sections = v;
        }
        if let Some(v) = update.improved_cv {
            self.improved_cv = v;
        }
    }
}

/// Groups indexed CV text by section, or falls back to the raw CV when nothing is indexed.
pub struct ExtractSections {
    pub cv_index: Arc<CvEmbeddingManager>,
}

#[async_trait]
impl Node<ImproveCvState> for ExtractSections {
    async fn run(&self, state: &ImproveCvState) -> anyhow::Result<ImproveCvUpdate> {
        let mut sections = BTreeMap::new();

        if self.cv_index.index_exists().await {
            info!("Using existing CV index for section extraction");
            let retriever = self.cv_index.get_retriever(SECTION_RETRIEVER_K).await?;
            for (section, query) in SECTION_QUERIES {
                let docs = retriever.invoke(query).await?;
                let text = docs
                    .iter()
                    .take(DOCS_PER_SECTION)
                    .map(|d| d.page_content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                sections.insert(section.to_string(), text);
            }
        } else {
            warn!("No CV index found, using the raw CV content");
            sections.insert("raw_content".to_string(), state.cv_content.clone());
        }

        Ok(ImproveCvUpdate {
            cv_sections: Some(sections),
            ..Default::default()
        })
    }
}

pub struct ImproveStructure {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<ImproveCvState> for ImproveStructure {
    async fn run(&self, state: &ImproveCvState) -> anyhow::Result<ImproveCvUpdate> {
        let sections = serde_json::to_string_pretty(&state.cv_sections)?;
        let prompt = fill_template(
            IMPROVE_STRUCTURE_PROMPT,
            &[
                ("feedback", state.feedback.as_str()),
                ("cv_sections", sections.as_str()),
            ],
        );
        let improved = self.llm.complete(&prompt).await?;

        Ok(ImproveCvUpdate {
            improved_cv: Some(improved),
            ..Default::default()
        })
    }
}

pub struct FormatCv {
    pub llm: Arc<dyn ChatModel>,
}

#[async_trait]
impl Node<ImproveCvState> for FormatCv {
    async fn run(&self, state: &ImproveCvState) -> anyhow::Result<ImproveCvUpdate> {
        let prompt = fill_template(
            FORMAT_CV_PROMPT,
            &[("improved_cv", state.improved_cv.as_str())],
        );
        let formatted = self.llm.complete(&prompt).await?;

        Ok(ImproveCvUpdate {
            improved_cv: Some(formatted),
            ..Default::default()
        })
    }
}

pub fn build_improve_graph(
    llm: Arc<dyn ChatModel>,
    cv_index: Arc<CvEmbeddingManager>,
) -> Result<CompiledGraph<ImproveCvState>, WorkflowError> {
    StateGraph::<ImproveCvState>::new()
        .add_node(EXTRACT_SECTIONS, ExtractSections { cv_index })
        .add_node(IMPROVE_STRUCTURE, ImproveStructure { llm: llm.clone() })
        .add_node(FORMAT_CV, FormatCv { llm })
        .set_entry_point(EXTRACT_SECTIONS)
        .add_edge(EXTRACT_SECTIONS, IMPROVE_STRUCTURE)
        .add_edge(IMPROVE_STRUCTURE, FORMAT_CV)
        .add_edge(FORMAT_CV, END)
        .compile(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::testing::{empty_index, indexed_cv, ScriptedChatModel};

    #[tokio::test]
    async fn test_indexed_cv_is_grouped_by_section() {
        let (_dir, cv_index) = indexed_cv().await;
        let llm = Arc::new(ScriptedChatModel::new(&["borrador mejorado", "• CV final"]));
        let graph = build_improve_graph(llm.clone(), cv_index).unwrap();

        let state = ImproveCvState {
            feedback: "Agrega fechas a la experiencia".to_string(),
            ..Default::default()
        };
        let out = graph.invoke(state, "improve").await.unwrap();

        let keys: Vec<_> = out.cv_sections.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["achievements", "education", "experience", "personal_info", "skills"]
        );
        assert!(out.cv_sections["education"].contains("Universidad"));
        assert_eq!(out.improved_cv, "• CV final");

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Agrega fechas a la experiencia"));
        assert!(prompts[0].contains("\"education\""));
        assert!(prompts[1].contains("borrador mejorado"));
    }

    #[tokio::test]
    async fn test_without_index_uses_raw_content() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedChatModel::new(&["mejorado", "formateado"]));
        let graph = build_improve_graph(llm.clone(), empty_index(&dir)).unwrap();

        let state = ImproveCvState {
            cv_content: "Juan Soto, desarrollador".to_string(),
            feedback: "Falta educación".to_string(),
            ..Default::default()
        };
        let out = graph.invoke(state, "improve").await.unwrap();

        assert_eq!(out.cv_sections.len(), 1);
        assert_eq!(out.cv_sections["raw_content"], "Juan Soto, desarrollador");
        assert_eq!(out.improved_cv, "formateado");
        assert!(llm.prompts()[0].contains("Juan Soto, desarrollador"));
    }

    #[tokio::test]
    async fn test_feedback_braces_are_not_substituted() {
        let llm = Arc::new(ScriptedChatModel::new(&["mejorado"]));
        let node = ImproveStructure { llm: llm.clone() };
        let state = ImproveCvState {
            feedback: "Revisa {cv_sections} a mano".to_string(),
            cv_sections: BTreeMap::from([("skills".to_string(), "Rust".to_string())]),
            ..Default::default()
        };
        node.run(&state).await.unwrap();

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Revisa {cv_sections} a mano"));
        assert!(prompt.contains("\"skills\": \"Rust\""));
    }
}
