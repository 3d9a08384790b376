mod tests_policy;
