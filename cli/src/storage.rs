use std::{collections::HashMap, path::PathBuf, sync::Arc};

use futures::FutureExt;

/// The raw bytes of one demo, either mapped from disk or held in memory.
#[derive(Debug, Clone)]
pub enum AnalysisData {
    MemMapped(Arc<memmap2::Mmap>),
    Preloaded(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub name: String,
    data: AnalysisData,
}

impl AnalysisInput {
    pub async fn load(name: String, storage: &dyn DemoStorage) -> anyhow::Result<Self> {
        let data = storage.load(name.clone()).await?;

        Ok(Self { name, data })
    }

    pub fn data(&self) -> &[u8] {
        match &self.data {
            AnalysisData::MemMapped(v) => v,
            AnalysisData::Preloaded(v) => v,
        }
    }
}

pub trait DemoStorage: Send + Sync {
    fn duplicate(&self) -> Box<dyn DemoStorage>;

    fn load<'f, 'own>(&'own self, name: String) -> futures::future::BoxFuture<'f, anyhow::Result<AnalysisData>>
    where
        'own: 'f;
}

/// Demos on the local file system, names are paths relative to `folder`.
pub struct FileStorage {
    folder: Arc<PathBuf>,
}

impl FileStorage {
    pub fn new<P>(folder: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            folder: Arc::new(folder.into()),
        }
    }
}

impl DemoStorage for FileStorage {
    fn duplicate(&self) -> Box<dyn DemoStorage> {
        Box::new(Self {
            folder: self.folder.clone(),
        })
    }

    fn load<'f, 'own>(&'own self, name: String) -> futures::future::BoxFuture<'f, anyhow::Result<AnalysisData>>
    where
        'own: 'f,
    {
        use anyhow::Context;

        async move {
            let path = self.folder.join(&name);
            let file = std::fs::File::open(&path)
                .with_context(|| format!("Opening {}", path.display()))?;

            // Empty files can not be mapped
            let mapped = match file.metadata() {
                Ok(m) if m.len() > 0 => unsafe { memmap2::MmapOptions::new().map(&file) },
                Ok(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "empty file",
                )),
                Err(e) => Err(e),
            };

            match mapped {
                Ok(mmap) => Ok(AnalysisData::MemMapped(Arc::new(mmap))),
                Err(e) => {
                    tracing::debug!(path = %path.display(), "Mapping failed, reading instead: {}", e);

                    let data = tokio::fs::read(&path)
                        .await
                        .with_context(|| format!("Reading {}", path.display()))?;
                    Ok(AnalysisData::Preloaded(data.into()))
                }
            }
        }
        .boxed()
    }
}

/// Demos held in memory, used for fixtures.
#[derive(Default)]
pub struct MemoryStorage {
    demos: Arc<HashMap<String, Arc<[u8]>>>,
}

impl MemoryStorage {
    pub fn new<I>(demos: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        Self {
            demos: Arc::new(
                demos
                    .into_iter()
                    .map(|(name, data)| (name, data.into()))
                    .collect(),
            ),
        }
    }
}

impl DemoStorage for MemoryStorage {
    fn duplicate(&self) -> Box<dyn DemoStorage> {
        Box::new(Self {
            demos: self.demos.clone(),
        })
    }

    fn load<'f, 'own>(&'own self, name: String) -> futures::future::BoxFuture<'f, anyhow::Result<AnalysisData>>
    where
        'own: 'f,
    {
        async move {
            let data = self
                .demos
                .get(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown demo {:?}", name))?;

            Ok(AnalysisData::Preloaded(data.clone()))
        }
        .boxed()
    }
}
