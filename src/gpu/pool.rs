// ============================================================================
// TEXTURE POOL: recycle layer textures across resizes and deletions
// ============================================================================

use std::collections::HashMap;

/// Textures keyed by `(width, height)`.  When a surface changes size or is
/// released, its old texture is parked here; the next surface of that size
/// takes it instead of allocating.
pub struct TexturePool<T = wgpu::Texture> {
    pool: HashMap<(u32, u32), Vec<T>>,
    max_per_key: usize,
}

impl<T> TexturePool<T> {
    pub fn new() -> Self {
        Self { pool: HashMap::new(), max_per_key: 4 }
    }

    pub fn acquire(&mut self, width: u32, height: u32) -> Option<T> {
        self.pool.get_mut(&(width, height)).and_then(|v| v.pop())
    }

    /// Park a texture.  Beyond `max_per_key` per size it is simply dropped.
    pub fn release(&mut self, texture: T, width: u32, height: u32) {
        let entry = self.pool.entry((width, height)).or_default();
        if entry.len() < self.max_per_key {
            entry.push(texture);
        }
    }

    pub fn clear(&mut self) {
        self.pool.clear();
    }

    pub fn pooled_count(&self) -> usize {
        self.pool.values().map(|v| v.len()).sum()
    }

    /// Approximate memory held by parked textures, in bytes.
    pub fn pooled_memory_bytes(&self) -> usize {
        self.pool
            .iter()
            .map(|((w, h), v)| *w as usize * *h as usize * 4 * v.len())
            .sum()
    }
}

impl<T> Default for TexturePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_matches_size_and_caps_per_key() {
        let mut pool: TexturePool<u32> = TexturePool::new();
        for i in 0..6 {
            pool.release(i, 8, 8);
        }
        pool.release(99, 4, 4);
        assert_eq!(pool.pooled_count(), 5);
        assert_eq!(pool.pooled_memory_bytes(), 4 * 8 * 8 * 4 + 4 * 4 * 4);
        assert_eq!(pool.acquire(4, 4), Some(99));
        assert_eq!(pool.acquire(4, 4), None);
        assert!(pool.acquire(8, 8).is_some());
    }
}
