//! Pipeline drivers for the extract and index subcommands.
//!
//! One document is fully pipelined (convert, clean, annotate, extract,
//! link) before the next begins. Service failures and malformed documents
//! are logged and skipped; data-integrity violations abort the run.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use lithos_annotate::{document_metadata_from_map, AnnotationClient, ConversionClient};
use lithos_clean::TextNormalizer;
use lithos_core::{
    AppConfig, ConfigError, Document, Entity, EntityLabel, Lexicon, Relation, Result, Sentence,
};
use lithos_extract::{
    EntityExtractor, LinkMethod, PairwiseLinker, RelationLinker, RoleTagger, SubprocessClassifier,
};
use lithos_index::{document_id, merge_with_existing, AnnotationIndexBuilder, IndexClient};

use crate::{ExtractArgs, IndexArgs};

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Relation source selected at startup.
enum RelationMode {
    NearestNeighbor(LinkMethod, RoleTagger<SubprocessClassifier>),
    Pairwise(PairwiseLinker<SubprocessClassifier>),
}

struct ExtractPipeline {
    conversion: ConversionClient,
    annotation: AnnotationClient,
    normalizer: TextNormalizer,
    extractor: EntityExtractor,
    linker: RelationLinker,
    mode: RelationMode,
}

impl ExtractPipeline {
    /// Wire up clients and classifiers. Missing models and bad URLs are
    /// fatal here, before any document is touched.
    fn new(config: &AppConfig, args: &ExtractArgs) -> Result<Self> {
        let timeout = Duration::from_secs(config.services.request_timeout_secs);

        let conversion_url = args
            .conversion_url
            .clone()
            .unwrap_or_else(|| config.services.conversion_url.clone());
        let annotation_url = args
            .annotation_url
            .clone()
            .unwrap_or_else(|| config.services.annotation_url.clone());
        let method_name = args
            .link_method
            .clone()
            .unwrap_or_else(|| config.linker.method.clone());

        let mode = if method_name == "pairwise" {
            let model = args
                .pairwise_model
                .clone()
                .or_else(|| config.classifier.pairwise_model.clone())
                .ok_or_else(|| {
                    ConfigError::MissingRequired("classifier.pairwise_model".to_string())
                })?;
            RelationMode::Pairwise(PairwiseLinker::new(SubprocessClassifier::new(
                &config.classifier,
                &model,
            )?))
        } else {
            let method: LinkMethod = method_name.parse()?;
            let container = args
                .container_model
                .clone()
                .or_else(|| config.classifier.container_model.clone())
                .ok_or_else(|| {
                    ConfigError::MissingRequired("classifier.container_model".to_string())
                })?;
            let containee = args
                .containee_model
                .clone()
                .or_else(|| config.classifier.containee_model.clone())
                .ok_or_else(|| {
                    ConfigError::MissingRequired("classifier.containee_model".to_string())
                })?;
            RelationMode::NearestNeighbor(
                method,
                RoleTagger::new(
                    SubprocessClassifier::new(&config.classifier, &container)?,
                    SubprocessClassifier::new(&config.classifier, &containee)?,
                ),
            )
        };

        Ok(Self {
            conversion: ConversionClient::new(conversion_url, timeout)?,
            annotation: AnnotationClient::new(annotation_url, args.ner_model.as_deref(), timeout)?,
            normalizer: TextNormalizer::new(),
            extractor: EntityExtractor::new(Arc::new(Lexicon::builtin())),
            linker: RelationLinker::new(),
            mode,
        })
    }

    async fn process_file(&self, path: &Path) -> Result<Document> {
        let converted = self.conversion.convert(path).await?;
        converted.require_content_type(PDF_CONTENT_TYPE)?;
        let metadata = document_metadata_from_map(&converted.metadata)?;

        let cleaned = self.normalizer.normalize(&converted.content);
        let sentences = self.annotation.annotate(&cleaned.text).await?;

        let base = self.extractor.extract(&sentences, false);
        let generalized = self.extractor.extract(&sentences, true);
        let entities = merge_entity_sets(base, &generalized);

        tracing::info!(
            path = %path.display(),
            sentences = sentences.len(),
            entities = entities.len(),
            "annotated document"
        );

        let relations = self.link_relations(&sentences, &generalized, &entities)?;

        Ok(Document {
            id: document_id(&path.to_string_lossy()),
            source_path: path.display().to_string(),
            metadata,
            raw_text: converted.content,
            cleaned_text: cleaned.text,
            references: cleaned.references,
            sentences,
            entities,
            relations,
        })
    }

    /// A failed classifier leaves the document with its entities and an
    /// empty relation set; it is not a document-level failure.
    fn link_relations(
        &self,
        sentences: &[Sentence],
        generalized: &[Entity],
        entities: &[Entity],
    ) -> Result<Vec<Relation>> {
        match &self.mode {
            RelationMode::NearestNeighbor(method, tagger) => {
                let targets: Vec<Entity> = generalized
                    .iter()
                    .filter(|e| e.label == EntityLabel::Target)
                    .cloned()
                    .collect();
                let components: Vec<Entity> = generalized
                    .iter()
                    .filter(|e| e.label == EntityLabel::Component)
                    .cloned()
                    .collect();

                match tagger.tag(sentences, targets, components) {
                    Ok((t, c)) => Ok(self.linker.link(*method, &t, &c)),
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(error = %e, "role classifier failed; emitting document without relations");
                        Ok(Vec::new())
                    }
                    Err(e) => Err(e),
                }
            }
            RelationMode::Pairwise(linker) => linker.link(sentences, entities),
        }
    }
}

/// Union of the base-label entity set and the component-generalized view,
/// keyed by (label, span) with base entities first, in document order.
/// Both labelings are kept so relation endpoints and index records can
/// refer to either.
fn merge_entity_sets(base: Vec<Entity>, generalized: &[Entity]) -> Vec<Entity> {
    let mut entities = base;
    let mut seen: HashSet<(EntityLabel, usize, usize)> = entities
        .iter()
        .map(|e| (e.label, e.span.begin, e.span.end))
        .collect();
    for e in generalized {
        if seen.insert((e.label, e.span.begin, e.span.end)) {
            entities.push(e.clone());
        }
    }
    entities.sort_by_key(|e| (e.sentence, e.span.begin, e.span.end, e.label.as_str()));
    entities
}

pub async fn run_extract(
    config: AppConfig,
    args: ExtractArgs,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!(
        files = files.len(),
        out_file = %args.out_file.display(),
        link_method = args.link_method.as_deref().unwrap_or(&config.linker.method),
        "starting extraction"
    );

    let pipeline = ExtractPipeline::new(&config, &args)?;

    let out = std::fs::File::create(&args.out_file)
        .with_context(|| format!("creating {}", args.out_file.display()))?;
    let mut writer = std::io::BufWriter::new(out);

    let mut written = 0usize;
    let mut skipped = 0usize;
    for path in &files {
        tracing::info!(path = %path.display(), "processing");
        match pipeline.process_file(path).await {
            Ok(doc) => {
                serde_json::to_writer(&mut writer, &doc)?;
                writer.write_all(b"\n")?;
                writer.flush()?;
                written += 1;
            }
            Err(e) if e.is_recoverable() => {
                skipped += 1;
                tracing::warn!(path = %path.display(), error = %e, "skipping document");
            }
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("fatal error processing {}", path.display())));
            }
        }
    }

    tracing::info!(written, skipped, "extraction complete");
    Ok(())
}

pub async fn run_index(
    config: AppConfig,
    args: IndexArgs,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let index_url = args
        .index_url
        .clone()
        .unwrap_or_else(|| config.services.index_url.clone());
    let client = IndexClient::new(
        &index_url,
        Duration::from_secs(config.services.request_timeout_secs),
    )?;
    let builder = AnnotationIndexBuilder::new();
    let batch_size = args.batch_size.unwrap_or(config.indexing.batch_size);
    let commit = config.indexing.commit && !args.no_commit;

    let mut records = Vec::new();
    for file in &files {
        for doc in read_documents(file)? {
            let flattened = builder.flatten(&doc)?;
            let flattened = if args.update {
                merge_with_existing(&client, flattened).await?
            } else {
                flattened
            };
            records.extend(flattened);
        }
    }

    let flushed = client.post_batched(&records, batch_size, commit).await?;
    tracing::info!(records = flushed, index_url = %index_url, "indexing complete");
    Ok(())
}

/// Read a JSON-lines dump of processed documents.
fn read_documents(path: &Path) -> anyhow::Result<Vec<Document>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("parsing {}:{}", path.display(), i + 1))
        })
        .collect()
}
