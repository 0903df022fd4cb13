use std::hash::Hasher;

use fnv::FnvHasher;

/// Hash FNV-1a de la clave, recortado a 31 bits (siempre no negativo).
///
/// Es estable entre corridas, pero el valor concreto no es parte de ningún
/// formato: sólo importa que map y reduce vean el mismo reparto.
pub fn ihash(key: &str) -> u32 {
    let mut h = FnvHasher::default();
    h.write(key.as_bytes());
    (h.finish() & 0x7fff_ffff) as u32
}

/// Índice de reduce (shard) al que va `key` cuando hay `n_reduce` reduces.
/// `n_reduce` debe ser > 0; el map executor lo valida antes.
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce
}
