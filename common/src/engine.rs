use anyhow::Context;
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use crate::apps::{MapFn, ReduceFn, Workload};
use crate::error::TaskError;
use crate::merge::{cleanup_intermediate, merge_outputs};
use crate::partition::partition_for;
use crate::paths::{reduce_output_path, shard_path, validate_job_name};
use crate::records::{open_records, write_records, KeyValue};
use crate::task::{Phase, TaskDescriptor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapStats {
    pub records: usize,
    pub shards_written: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceStats {
    pub shards_read: u32,
    pub shards_missing: u32,
    pub keys: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStats {
    Map(MapStats),
    Reduce(ReduceStats),
}

/* =========================
   Map
   ========================= */

/// Ejecuta una tarea map:
///   1. Lee `in_file` completo (UTF-8 con reemplazo) y llama a `map_fn`.
///   2. Reparte cada par por `hash(key) % n_reduce`.
///   3. Escribe un shard JSONL por cada reduce que recibió algo.
///
/// Los shards que quedan vacíos no se escriben, y si un intento anterior
/// había dejado uno en esa ruta se borra, así la unión de los shards presentes
/// siempre es exactamente la salida de este intento.
pub fn do_map(
    dir: &Path,
    job_name: &str,
    map_task: u32,
    in_file: &str,
    n_reduce: u32,
    map_fn: MapFn,
) -> Result<MapStats, TaskError> {
    if n_reduce == 0 {
        return Err(TaskError::InvalidTask(format!(
            "map {} de {} con n_reduce = 0",
            map_task, job_name
        )));
    }

    let bytes = fs::read(in_file).map_err(|source| TaskError::ReadInput {
        path: PathBuf::from(in_file),
        source,
    })?;
    // bytes inválidos en UTF-8 pasan como U+FFFD: el contenido nunca hace fallar el intento
    let contents = String::from_utf8_lossy(&bytes);

    let kvs = map_fn(in_file, &contents);
    let records = kvs.len();

    // shard -> registros (el orden dentro del shard no importa)
    let mut shards: BTreeMap<u32, Vec<KeyValue>> = BTreeMap::new();
    for kv in kvs {
        let r = partition_for(&kv.key, n_reduce);
        shards.entry(r).or_default().push(kv);
    }

    for r in 0..n_reduce {
        let path = shard_path(dir, job_name, map_task, r);
        match shards.get(&r) {
            Some(recs) => {
                write_records(&path, recs)?;
            }
            None => remove_if_exists(&path)?,
        }
    }

    Ok(MapStats {
        records,
        shards_written: shards.len() as u32,
    })
}

fn remove_if_exists(path: &Path) -> Result<(), TaskError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TaskError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/* =========================
   Reduce
   ========================= */

/// Ejecuta una tarea reduce:
///   1. Lee el shard `(m, reduce_task)` de cada map `m` en `0..n_map`.
///      Un shard ausente aporta cero registros; uno corrupto hace fallar el intento.
///   2. Agrupa valores por clave (en orden de m ascendente).
///   3. Llama a `reduce_fn` por clave, en orden ascendente de clave.
///   4. Escribe la salida JSONL en `out_file` (truncando).
pub fn do_reduce(
    dir: &Path,
    job_name: &str,
    reduce_task: u32,
    n_map: u32,
    out_file: &Path,
    reduce_fn: ReduceFn,
) -> Result<ReduceStats, TaskError> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut shards_read = 0;
    let mut shards_missing = 0;

    for m in 0..n_map {
        let path = shard_path(dir, job_name, m, reduce_task);
        let Some(reader) = open_records(&path)? else {
            shards_missing += 1;
            continue;
        };

        for kv in reader {
            let kv = kv?;
            grouped.entry(kv.key).or_default().push(kv.value);
        }
        shards_read += 1;
    }

    let output: Vec<KeyValue> = grouped
        .iter()
        .map(|(key, values)| KeyValue::new(key.clone(), reduce_fn(key, values)))
        .collect();

    write_records(out_file, &output)?;

    Ok(ReduceStats {
        shards_read,
        shards_missing,
        keys: output.len(),
    })
}

/* =========================
   Despacho de una tarea remota
   ========================= */

/// Lo que ejecuta el worker por cada descriptor recibido.
/// Reejecutar el mismo descriptor con las mismas entradas deja archivos idénticos.
pub fn execute_task(
    dir: &Path,
    task: &TaskDescriptor,
    workload: Workload,
) -> Result<TaskStats, TaskError> {
    validate_job_name(&task.job_name)?;

    match task.phase {
        Phase::Map => {
            let file = task.file.as_deref().ok_or_else(|| {
                TaskError::InvalidTask(format!(
                    "tarea map {} de {} sin archivo de entrada",
                    task.task_number, task.job_name
                ))
            })?;
            do_map(
                dir,
                &task.job_name,
                task.task_number,
                file,
                task.num_other_phase,
                workload.map_fn,
            )
            .map(TaskStats::Map)
        }
        Phase::Reduce => {
            let out_file = reduce_output_path(dir, &task.job_name, task.task_number);
            do_reduce(
                dir,
                &task.job_name,
                task.task_number,
                task.num_other_phase,
                &out_file,
                workload.reduce_fn,
            )
            .map(TaskStats::Reduce)
        }
    }
}

/* =========================
   Job completo en un solo proceso
   ========================= */

/// Todos los maps, todos los reduces y el merge final, en secuencia.
/// Devuelve la ruta del resultado.
pub fn run_sequential(
    dir: &Path,
    job_name: &str,
    files: &[String],
    n_reduce: u32,
    workload: Workload,
) -> anyhow::Result<PathBuf> {
    validate_job_name(job_name)?;

    let n_map = files.len() as u32;

    for (m, file) in files.iter().enumerate() {
        do_map(dir, job_name, m as u32, file, n_reduce, workload.map_fn)
            .with_context(|| format!("map {} ({})", m, file))?;
    }

    for r in 0..n_reduce {
        let out_file = reduce_output_path(dir, job_name, r);
        do_reduce(dir, job_name, r, n_map, &out_file, workload.reduce_fn)
            .with_context(|| format!("reduce {}", r))?;
    }

    let result = merge_outputs(dir, job_name, n_reduce)?;
    cleanup_intermediate(dir, job_name)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps;
    use crate::records::{read_records, read_records_if_exists};
    use std::collections::{HashMap, HashSet};
    use std::io::Write;

    fn temp_dir(sub: &str) -> PathBuf {
        let base = std::env::temp_dir().join("engine_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn write_input(dir: &Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    fn split_map(_file: &str, contents: &str) -> Vec<KeyValue> {
        contents
            .split_whitespace()
            .map(|w| KeyValue::new(w, "1"))
            .collect()
    }

    fn count_reduce(_key: &str, values: &[String]) -> String {
        values.len().to_string()
    }

    fn join_reduce(_key: &str, values: &[String]) -> String {
        values.join("|")
    }

    #[test]
    fn do_map_reparte_cada_par_en_su_shard() {
        let tmp = temp_dir("map_basico");
        let input = write_input(&tmp, "in.txt", "a b a");

        let stats = do_map(&tmp, "job", 0, &input, 2, split_map).unwrap();
        assert_eq!(stats.records, 3);

        let mut union: Vec<KeyValue> = Vec::new();
        for r in 0..2 {
            let path = shard_path(&tmp, "job", 0, r);
            if let Some(recs) = read_records_if_exists(&path).unwrap() {
                for kv in &recs {
                    assert_eq!(partition_for(&kv.key, 2), r);
                }
                union.extend(recs);
            }
        }

        union.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(
            union,
            vec![
                KeyValue::new("a", "1"),
                KeyValue::new("a", "1"),
                KeyValue::new("b", "1"),
            ]
        );
    }

    fn shard_union(dir: &Path, map_task: u32, n_reduce: u32) -> Vec<KeyValue> {
        let mut union = Vec::new();
        for r in 0..n_reduce {
            let path = shard_path(dir, "job", map_task, r);
            if let Some(recs) = read_records_if_exists(&path).unwrap() {
                for kv in &recs {
                    assert_eq!(partition_for(&kv.key, n_reduce), r, "clave {:?}", kv.key);
                }
                union.extend(recs);
            }
        }
        union.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));
        union
    }

    #[test]
    fn do_map_union_de_shards_es_la_salida_del_map() {
        let tmp = temp_dir("map_union");

        // 40 claves, cada una repetida entre 1 y 4 veces
        let mut words = Vec::new();
        for i in 0..40 {
            for _ in 0..(i % 4 + 1) {
                words.push(format!("k{}", i));
            }
        }
        let contents = words.join(" ");
        let input = write_input(&tmp, "in.txt", &contents);

        let stats = do_map(&tmp, "job", 3, &input, 5, split_map).unwrap();
        assert_eq!(stats.records, words.len());

        let mut expected = split_map(&input, &contents);
        expected.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.value.cmp(&b.value)));

        assert_eq!(shard_union(&tmp, 3, 5), expected);
    }

    #[test]
    fn do_map_acepta_input_que_no_es_utf8() {
        let tmp = temp_dir("map_latin1");
        let path = tmp.join("latin1.txt");
        fs::write(&path, b"caf\xe9 ok caf\xe9").unwrap();
        let input = path.to_string_lossy().to_string();

        let stats = do_map(&tmp, "job", 0, &input, 2, split_map).unwrap();
        assert_eq!(stats.records, 3);

        let keys: Vec<String> = shard_union(&tmp, 0, 2).into_iter().map(|kv| kv.key).collect();
        assert_eq!(keys, vec!["caf\u{FFFD}", "caf\u{FFFD}", "ok"]);
    }

    #[test]
    fn do_map_no_escribe_shards_vacios() {
        let tmp = temp_dir("map_vacio");
        let input = write_input(&tmp, "in.txt", "   ");

        let stats = do_map(&tmp, "job", 0, &input, 3, split_map).unwrap();
        assert_eq!(stats.shards_written, 0);
        for r in 0..3 {
            assert!(!shard_path(&tmp, "job", 0, r).exists());
        }
    }

    #[test]
    fn do_map_borra_shards_de_un_intento_anterior() {
        let tmp = temp_dir("map_stale");
        let input = write_input(&tmp, "in.txt", "a b c d e f g h");
        do_map(&tmp, "job", 0, &input, 4, split_map).unwrap();

        // el input cambia entre intentos: sólo queda "a"
        write_input(&tmp, "in.txt", "a");
        do_map(&tmp, "job", 0, &input, 4, split_map).unwrap();

        let mut present = 0;
        for r in 0..4 {
            if let Some(recs) = read_records_if_exists(&shard_path(&tmp, "job", 0, r)).unwrap() {
                assert_eq!(recs, vec![KeyValue::new("a", "1")]);
                present += 1;
            }
        }
        assert_eq!(present, 1);
    }

    #[test]
    fn do_map_con_input_inexistente_falla_sin_panic() {
        let tmp = temp_dir("map_missing");
        let input = tmp.join("no_existe.txt");

        let res = do_map(&tmp, "job", 0, input.to_str().unwrap(), 2, split_map);
        assert!(matches!(res, Err(TaskError::ReadInput { .. })));
    }

    #[test]
    fn do_map_rechaza_n_reduce_cero() {
        let tmp = temp_dir("map_r0");
        let input = write_input(&tmp, "in.txt", "a");

        let res = do_map(&tmp, "job", 0, &input, 0, split_map);
        assert!(matches!(res, Err(TaskError::InvalidTask(_))));
    }

    #[test]
    fn map_y_reduce_cuentan_a_b_a() {
        let tmp = temp_dir("escenario_aba");
        let input = write_input(&tmp, "in.txt", "a b a");
        do_map(&tmp, "job", 0, &input, 2, split_map).unwrap();

        // M = 1: un solo map; juntamos los dos reduces
        let mut out: Vec<KeyValue> = Vec::new();
        for r in 0..2 {
            let out_file = reduce_output_path(&tmp, "job", r);
            do_reduce(&tmp, "job", r, 1, &out_file, count_reduce).unwrap();
            let recs = read_records(&out_file).unwrap();
            // cada salida viene ordenada por clave
            let keys: Vec<&String> = recs.iter().map(|kv| &kv.key).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
            out.extend(recs);
        }

        out.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(out, vec![KeyValue::new("a", "2"), KeyValue::new("b", "1")]);
    }

    #[test]
    fn do_reduce_tolera_shard_ausente() {
        let tmp = temp_dir("reduce_ausente");
        write_records(&shard_path(&tmp, "job", 0, 0), &vec![KeyValue::new("x", "1")]).unwrap();
        // el map 1 no dejó nada para el reduce 0
        write_records(&shard_path(&tmp, "job", 2, 0), &vec![KeyValue::new("x", "1")]).unwrap();

        let out_file = tmp.join("out.jsonl");
        let stats = do_reduce(&tmp, "job", 0, 3, &out_file, count_reduce).unwrap();

        assert_eq!(stats.shards_read, 2);
        assert_eq!(stats.shards_missing, 1);
        assert_eq!(read_records(&out_file).unwrap(), vec![KeyValue::new("x", "2")]);
    }

    #[test]
    fn do_reduce_falla_con_shard_corrupto() {
        let tmp = temp_dir("reduce_corrupto");
        let path = shard_path(&tmp, "job", 0, 0);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"key\":\"a\",\"value\":\"1\"}\nesto no es json\n").unwrap();

        let res = do_reduce(&tmp, "job", 0, 1, &tmp.join("out.jsonl"), count_reduce);
        assert!(matches!(res, Err(TaskError::Decode { line: 2, .. })));
    }

    #[test]
    fn do_reduce_agrupa_valores_en_orden_de_map() {
        let tmp = temp_dir("reduce_orden");
        for m in 0..3u32 {
            write_records(
                &shard_path(&tmp, "job", m, 0),
                &vec![KeyValue::new("k", format!("m{}", m)), KeyValue::new("z", "x")],
            )
            .unwrap();
        }

        let out_file = tmp.join("out.jsonl");
        let stats = do_reduce(&tmp, "job", 0, 3, &out_file, join_reduce).unwrap();
        assert_eq!(stats.keys, 2);
        assert_eq!(
            read_records(&out_file).unwrap(),
            vec![KeyValue::new("k", "m0|m1|m2"), KeyValue::new("z", "x|x|x")]
        );
    }

    #[test]
    fn do_reduce_sin_maps_crea_salida_vacia() {
        let tmp = temp_dir("reduce_m0");
        let out_file = tmp.join("sub").join("out.jsonl");

        do_reduce(&tmp, "job", 0, 0, &out_file, count_reduce).unwrap();
        assert!(out_file.exists());
        assert!(read_records(&out_file).unwrap().is_empty());
    }

    #[test]
    fn reejecutar_la_misma_tarea_deja_bytes_identicos() {
        let tmp = temp_dir("idempotente");
        let input = write_input(&tmp, "in.txt", "uno dos tres dos uno uno\ncuatro");

        let map_task = TaskDescriptor {
            job_name: "job".to_string(),
            app: "wordcount".to_string(),
            phase: Phase::Map,
            task_number: 0,
            file: Some(input),
            num_other_phase: 3,
        };
        let wl = apps::lookup("wordcount").unwrap();

        let snapshot = |tmp: &Path| -> HashMap<u32, Option<Vec<u8>>> {
            (0..3)
                .map(|r| (r, fs::read(shard_path(tmp, "job", 0, r)).ok()))
                .collect()
        };

        execute_task(&tmp, &map_task, wl).unwrap();
        let first = snapshot(tmp.as_path());
        execute_task(&tmp, &map_task, wl).unwrap();
        assert_eq!(first, snapshot(tmp.as_path()));

        let reduce_task = TaskDescriptor {
            phase: Phase::Reduce,
            task_number: 1,
            file: None,
            num_other_phase: 1,
            ..map_task
        };
        execute_task(&tmp, &reduce_task, wl).unwrap();
        let out1 = fs::read(reduce_output_path(&tmp, "job", 1)).unwrap();
        execute_task(&tmp, &reduce_task, wl).unwrap();
        let out2 = fs::read(reduce_output_path(&tmp, "job", 1)).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn execute_task_map_sin_archivo_es_invalida() {
        let tmp = temp_dir("sin_archivo");
        let task = TaskDescriptor {
            job_name: "job".to_string(),
            app: "wordcount".to_string(),
            phase: Phase::Map,
            task_number: 0,
            file: None,
            num_other_phase: 2,
        };

        let res = execute_task(&tmp, &task, apps::lookup("wordcount").unwrap());
        assert!(matches!(res, Err(TaskError::InvalidTask(_))));
    }

    #[test]
    fn run_sequential_wordcount_end_to_end() {
        let tmp = temp_dir("secuencial");
        let f1 = write_input(&tmp, "a.txt", "Hola hola mundo");
        let f2 = write_input(&tmp, "b.txt", "mundo\nadiós");

        let result = run_sequential(
            &tmp,
            "wc",
            &[f1, f2],
            3,
            apps::lookup("wordcount").unwrap(),
        )
        .unwrap();

        let content = fs::read_to_string(&result).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["adiós: 1", "hola: 2", "mundo: 2"]);

        // los shards intermedios se limpian al final
        assert!(!crate::paths::shuffle_dir(&tmp, "wc").exists());

        // todas las claves quedaron en una sola salida de reduce
        let mut seen = HashSet::new();
        for r in 0..3 {
            for kv in read_records(&reduce_output_path(&tmp, "wc", r)).unwrap() {
                assert!(seen.insert(kv.key));
            }
        }
        assert_eq!(seen.len(), 3);
    }
}
