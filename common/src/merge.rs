use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::paths::{reduce_output_path, result_path, shuffle_dir};
use crate::records::{read_records, KeyValue};

/// Junta las salidas de los `n_reduce` reduces en un único archivo
/// `clave: valor` ordenado por clave. Acá una salida ausente sí es error:
/// el merge sólo corre después de una fase reduce completa.
///
/// Una clave con salto de línea o con `": "`, o un valor con salto de línea,
/// se escribe como string JSON entre comillas para que cada línea siga siendo
/// un único par sin ambigüedad.
pub fn merge_outputs(dir: &Path, job_name: &str, n_reduce: u32) -> Result<PathBuf> {
    let mut all: Vec<KeyValue> = Vec::new();

    for r in 0..n_reduce {
        let path = reduce_output_path(dir, job_name, r);
        let recs = read_records(&path)
            .with_context(|| format!("leyendo salida del reduce {}", r))?;
        all.extend(recs);
    }

    all.sort_by(|a, b| a.key.cmp(&b.key));

    let out_path = result_path(dir, job_name);
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creando {}", parent.display()))?;
    }

    let out = File::create(&out_path)
        .with_context(|| format!("creando {}", out_path.display()))?;
    let mut writer = BufWriter::new(out);

    for kv in &all {
        writeln!(
            writer,
            "{}: {}",
            result_field(&kv.key, true)?,
            result_field(&kv.value, false)?
        )?;
    }

    writer.flush()?;
    Ok(out_path)
}

fn result_field(s: &str, is_key: bool) -> Result<Cow<'_, str>> {
    let needs_quotes = s.contains(['\n', '\r'])
        || s.starts_with('"')
        || (is_key && s.contains(": "));

    if needs_quotes {
        Ok(Cow::Owned(serde_json::to_string(s)?))
    } else {
        Ok(Cow::Borrowed(s))
    }
}

/// Borra los shards intermedios del job. Si ya no existen, no pasa nada.
pub fn cleanup_intermediate(dir: &Path, job_name: &str) -> io::Result<()> {
    match fs::remove_dir_all(shuffle_dir(dir, job_name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
