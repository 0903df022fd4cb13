use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::TaskError;

/// Par clave/valor: salida del map, entrada y salida del reduce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/* =========================
   Escritura (JSONL)
   ========================= */

/// Escribe los registros en `path` como JSON Lines, truncando lo que hubiera.
///
/// Se escribe primero a un archivo temporal hermano y luego se hace `rename`,
/// así un intento que muere a medias (o dos intentos simultáneos de la misma
/// tarea) nunca dejan un archivo parcial en la ruta final.
pub fn write_records<'a, I>(path: &Path, records: I) -> Result<usize, TaskError>
where
    I: IntoIterator<Item = &'a KeyValue>,
{
    let write_err = |source: io::Error| TaskError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
    }

    let tmp = temp_sibling(path);
    let written = write_jsonl(&tmp, records).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_err(e)
    })?;

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        write_err(e)
    })?;

    Ok(written)
}

fn write_jsonl<'a, I>(path: &Path, records: I) -> io::Result<usize>
where
    I: IntoIterator<Item = &'a KeyValue>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    let mut written = 0;

    for kv in records {
        serde_json::to_writer(&mut writer, kv)?;
        writer.write_all(b"\n")?;
        written += 1;
    }

    writer.flush()?;
    Ok(written)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp-{}", name, uuid::Uuid::new_v4()))
}

/* =========================
   Lectura (JSONL)
   ========================= */

/// Iterador que decodifica registros línea a línea, sin conocer la cantidad de antemano.
pub struct RecordReader<R> {
    lines: io::Lines<R>,
    path: PathBuf,
    line_no: usize,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            lines: reader.lines(),
            path: path.into(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<KeyValue, TaskError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_no += 1;

            let line = match line {
                Ok(l) => l,
                Err(source) => {
                    return Some(Err(TaskError::Read {
                        path: self.path.clone(),
                        source,
                    }))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(serde_json::from_str(&line).map_err(|source| TaskError::Decode {
                path: self.path.clone(),
                line: self.line_no,
                source,
            }));
        }
    }
}

/// Lee todos los registros de `path`. Un archivo vacío son cero registros.
pub fn read_records(path: &Path) -> Result<Vec<KeyValue>, TaskError> {
    match read_records_if_exists(path)? {
        Some(recs) => Ok(recs),
        None => Err(TaskError::Read {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        }),
    }
}

/// Abre `path` para decodificar en streaming. Un archivo ausente es `Ok(None)`,
/// no un error: un map puede no haber emitido nada para ese shard.
pub fn open_records(path: &Path) -> Result<Option<RecordReader<BufReader<File>>>, TaskError> {
    match File::open(path) {
        Ok(f) => Ok(Some(RecordReader::new(BufReader::new(f), path))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(TaskError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Como `read_records`, pero un archivo ausente devuelve `Ok(None)`.
pub fn read_records_if_exists(path: &Path) -> Result<Option<Vec<KeyValue>>, TaskError> {
    match open_records(path)? {
        Some(reader) => reader.collect::<Result<Vec<_>, _>>().map(Some),
        None => Ok(None),
    }
}
