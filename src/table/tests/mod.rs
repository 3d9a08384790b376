mod tests_resize;
mod tests_shards;
