// Integration tests


mod concurrency_test;
mod reconcile_test;
mod resolver_test;
