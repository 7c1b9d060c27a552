//! An in-memory workspace implementing the reflector's collaborators.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use prism_cache::{ChangeDetector, MemoryBackend};
use tracing_subscriber::fmt::MakeWriter;
use prism_reflect::{
    ClassDecl, ConstantDecl, DeclarationExtractor, DocBlock, DocCommentParser, FileDeclarations,
    FunctionDecl, Name, Reflector, ReflectorBuilder, Source, SourceProvider, SymbolRef,
};

struct File {
    declarations: FileDeclarations,
    detector: ChangeDetector,
}

/// Files keyed by path. A [`Source`]'s code is the path itself; the extractor looks the
/// declarations up by it.
#[derive(Default)]
pub struct Workspace {
    files: Mutex<BTreeMap<String, File>>,
    locates: AtomicUsize,
    extracts: AtomicUsize,
}

impl Workspace {
    pub fn add_file(&self, path: &str, declarations: FileDeclarations, detector: ChangeDetector) {
        self.files.lock().insert(
            path.to_string(),
            File {
                declarations,
                detector,
            },
        );
    }

    pub fn add_class(&self, class: ClassDecl) {
        let path = format!("{}.php", class.qualified_name().unwrap_or_default());
        self.add_file(
            &path,
            FileDeclarations {
                classes: vec![class],
                ..FileDeclarations::default()
            },
            ChangeDetector::AlwaysFresh,
        );
    }

    pub fn add_function(&self, function: FunctionDecl) {
        let path = format!("{}.fn.php", function.qualified_name().unwrap_or_default());
        self.add_file(
            &path,
            FileDeclarations {
                functions: vec![function],
                ..FileDeclarations::default()
            },
            ChangeDetector::AlwaysFresh,
        );
    }

    pub fn add_constant(&self, constant: ConstantDecl) {
        let path = format!("{}.const.php", constant.qualified_name());
        self.add_file(
            &path,
            FileDeclarations {
                constants: vec![constant],
                ..FileDeclarations::default()
            },
            ChangeDetector::AlwaysFresh,
        );
    }

    pub fn locates(&self) -> usize {
        self.locates.load(Ordering::SeqCst)
    }

    pub fn extracts(&self) -> usize {
        self.extracts.load(Ordering::SeqCst)
    }
}

fn declares(declarations: &FileDeclarations, symbol: &SymbolRef) -> bool {
    let matches = |declared: Option<String>, wanted: &Name| {
        declared.is_some_and(|declared| Name::new(declared).eq_ignore_case(wanted))
    };
    match symbol {
        SymbolRef::Class(name) => declarations
            .classes
            .iter()
            .any(|class| matches(class.qualified_name(), name)),
        SymbolRef::Function(name) => declarations
            .functions
            .iter()
            .any(|function| matches(function.qualified_name(), name)),
        SymbolRef::Constant(name) => declarations
            .constants
            .iter()
            .any(|constant| constant.qualified_name() == name.as_str()),
    }
}

impl SourceProvider for Workspace {
    fn locate(&self, symbol: &SymbolRef) -> anyhow::Result<Option<Source>> {
        self.locates.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock();
        Ok(files
            .iter()
            .find(|(_, file)| declares(&file.declarations, symbol))
            .map(|(path, file)| Source::in_memory(path, file.detector.clone())))
    }

    fn load_file(&self, path: &Path) -> anyhow::Result<Source> {
        let path = path.to_string_lossy().into_owned();
        let files = self.files.lock();
        let file = files
            .get(&path)
            .ok_or_else(|| anyhow::anyhow!("no such file: {path}"))?;
        Ok(Source::in_memory(&path, file.detector.clone()))
    }
}

impl DeclarationExtractor for Workspace {
    fn extract(&self, source: &Source) -> anyhow::Result<FileDeclarations> {
        self.extracts.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock();
        let file = files
            .get(source.code.as_ref())
            .ok_or_else(|| anyhow::anyhow!("no such file: {}", source.code))?;
        Ok(file.declarations.clone())
    }
}

/// Doc comments are looked up verbatim; unknown text parses to an empty block.
#[derive(Default)]
pub struct DocTable {
    blocks: Mutex<HashMap<String, DocBlock>>,
}

impl DocTable {
    pub fn insert(&self, text: &str, block: DocBlock) {
        self.blocks.lock().insert(text.to_string(), block);
    }
}

impl DocCommentParser for DocTable {
    fn parse(&self, text: &str) -> anyhow::Result<DocBlock> {
        Ok(self.blocks.lock().get(text).cloned().unwrap_or_default())
    }
}

pub struct Fixture {
    pub workspace: Arc<Workspace>,
    pub docs: Arc<DocTable>,
    pub backend: Arc<MemoryBackend>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            workspace: Arc::new(Workspace::default()),
            docs: Arc::new(DocTable::default()),
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    pub fn builder(&self) -> ReflectorBuilder {
        Reflector::builder()
            .with_source_provider(self.workspace.clone())
            .with_extractor(self.workspace.clone())
            .with_doc_parser(self.docs.clone())
            .with_cache_backend(self.backend.clone())
    }

    pub fn reflector(&self) -> Reflector {
        self.builder().build().expect("reflector builds")
    }
}

/// Captures formatted tracing output for assertions.
#[derive(Clone, Default)]
pub struct SharedLogBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedLogBuffer {
    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

pub struct SharedLogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(self.0.clone())
    }
}
