//! Aplicaciones map/reduce compiladas en los workers.
//!
//! Un job elige la aplicación por nombre (`JobRequest::app`) y el worker la
//! resuelve con [`lookup`] al recibir cada tarea.

use std::collections::BTreeSet;

use crate::records::KeyValue;

/// Función map de usuario: (nombre del archivo, contenido) -> pares sin orden.
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// Función reduce de usuario: (clave, todos sus valores) -> valor reducido.
/// Los valores llegan en un orden determinista, pero hay que tratarlos como multiconjunto.
pub type ReduceFn = fn(&str, &[String]) -> String;

#[derive(Clone, Copy)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

const APPS: &[(&str, Workload)] = &[
    (
        "wordcount",
        Workload {
            map_fn: wordcount_map,
            reduce_fn: wordcount_reduce,
        },
    ),
    (
        "indexer",
        Workload {
            map_fn: indexer_map,
            reduce_fn: indexer_reduce,
        },
    ),
];

pub fn lookup(name: &str) -> Option<Workload> {
    APPS.iter().find(|(n, _)| *n == name).map(|(_, w)| *w)
}

pub fn names() -> Vec<&'static str> {
    APPS.iter().map(|(n, _)| *n).collect()
}

/// Tokens: alfanumérico y '_', en minúscula.
fn tokenize(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/* --------- wordcount --------- */

pub fn wordcount_map(_file_name: &str, contents: &str) -> Vec<KeyValue> {
    tokenize(contents).map(|t| KeyValue::new(t, "1")).collect()
}

/// Suma los valores; un valor no numérico cuenta como 0.
pub fn wordcount_reduce(_key: &str, values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.trim().parse::<u64>().unwrap_or(0))
        .sum::<u64>()
        .to_string()
}

/* --------- índice invertido --------- */

/// Emite (palabra, archivo) una sola vez por palabra distinta del archivo.
pub fn indexer_map(file_name: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<String> = tokenize(contents).collect();
    words
        .into_iter()
        .map(|w| KeyValue::new(w, file_name))
        .collect()
}

/// "<cantidad> <archivo1>,<archivo2>,..." con archivos ordenados y sin repetir.
pub fn indexer_reduce(_key: &str, values: &[String]) -> String {
    let files: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let joined: Vec<&str> = files.into_iter().collect();
    format!("{} {}", joined.len(), joined.join(","))
}
