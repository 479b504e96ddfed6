// Static metric catalogue: tracked configuration variables, signed status counters,
// and status columns that must exist even when a server version does not report them.

/// Server configuration variables tracked as gauges.
pub const CONFIGURATION_VARIABLES: &[&str] = &[
    "auto_increment_increment",
    "binlog_cache_size",
    "bulk_insert_buffer_size",
    "concurrent_insert",
    "connect_timeout",
    "delay_key_write",
    "delayed_insert_limit",
    "delayed_insert_timeout",
    "delayed_queue_size",
    "expire_logs_days",
    "foreign_key_checks",
    "group_concat_max_len",
    "innodb_additional_mem_pool_size",
    "innodb_autoextend_increment",
    "innodb_autoinc_lock_mode",
    "innodb_buffer_pool_size",
    "innodb_checksums",
    "innodb_commit_concurrency",
    "innodb_concurrency_tickets",
    "innodb_fast_shutdown",
    "innodb_file_io_threads",
    "innodb_file_per_table",
    "innodb_flush_log_at_trx_commit",
    "innodb_force_recovery",
    "innodb_lock_wait_timeout",
    "innodb_log_buffer_size",
    "innodb_log_file_size",
    "innodb_log_files_in_group",
    "innodb_max_dirty_pages_pct",
    "innodb_max_purge_lag",
    "innodb_mirrored_log_groups",
    "innodb_open_files",
    "innodb_rollback_on_timeout",
    "innodb_stats_on_metadata",
    "innodb_support_xa",
    "innodb_sync_spin_loops",
    "innodb_table_locks",
    "innodb_thread_concurrency",
    "innodb_thread_sleep_delay",
    "join_buffer_size",
    "key_buffer_size",
    "key_cache_age_threshold",
    "key_cache_block_size",
    "key_cache_division_limit",
    "large_files_support",
    "large_page_size",
    "large_pages",
    "locked_in_memory",
    "log_queries_not_using_indexes",
    "log_slow_queries",
    "long_query_time",
    "low_priority_updates",
    "max_allowed_packet",
    "max_binlog_cache_size",
    "max_binlog_size",
    "max_connect_errors",
    "max_connections",
    "max_delayed_threads",
    "max_error_count",
    "max_heap_table_size",
    "max_insert_delayed_threads",
    "max_join_size",
    "max_length_for_sort_data",
    "max_prepared_stmt_count",
    "max_relay_log_size",
    "max_seeks_for_key",
    "max_sort_length",
    "max_sp_recursion_depth",
    "max_tmp_tables",
    "max_user_connections",
    "max_write_lock_count",
    "min_examined_row_limit",
    "multi_range_count",
    "myisam_data_pointer_size",
    "myisam_max_sort_file_size",
    "myisam_repair_threads",
    "myisam_sort_buffer_size",
    "myisam_use_mmap",
    "net_buffer_length",
    "net_read_timeout",
    "net_retry_count",
    "net_write_timeout",
    "old_passwords",
    "open_files_limit",
    "optimizer_prune_level",
    "optimizer_search_depth",
    "port",
    "preload_buffer_size",
    "profiling",
    "profiling_history_size",
    "protocol_version",
    "query_alloc_block_size",
    "query_cache_limit",
    "query_cache_min_res_unit",
    "query_cache_size",
    "query_cache_type",
    "query_cache_wlock_invalidate",
    "query_prealloc_size",
    "range_alloc_block_size",
    "read_buffer_size",
    "read_only",
    "read_rnd_buffer_size",
    "relay_log_space_limit",
    "rpl_recovery_rank",
    "server_id",
    "skip_external_locking",
    "skip_networking",
    "skip_show_database",
    "slave_compressed_protocol",
    "slave_net_timeout",
    "slave_transaction_retries",
    "slow_launch_time",
    "slow_query_log",
    "sort_buffer_size",
    "sql_auto_is_null",
    "sql_big_selects",
    "sql_big_tables",
    "sql_buffer_result",
    "sql_log_bin",
    "sql_log_off",
    "sql_log_update",
    "sql_low_priority_updates",
    "sql_max_join_size",
    "sql_notes",
    "sql_quote_show_create",
    "sql_safe_updates",
    "sql_select_limit",
    "sql_warnings",
    "sync_binlog",
    "sync_frm",
    "table_cache",
    "table_definition_cache",
    "table_lock_wait_timeout",
    "table_open_cache",
    "thread_cache_size",
    "thread_stack",
    "timed_mutexes",
    "tmp_table_size",
    "transaction_alloc_block_size",
    "transaction_prealloc_size",
    "unique_checks",
    "updatable_views_with_limit",
    "wait_timeout",
];

/// Status counters that legitimately decrease between snapshots.
pub const SIGNED_STATUS_VARIABLES: &[&str] = &[
    "threads_cached",
    "threads_connected",
    "threads_running",
    "open_table_definitions",
    "open_tables",
    "slave_open_temp_tables",
    "qcache_free_blocks",
    "qcache_free_memory",
    "qcache_queries_in_cache",
    "qcache_total_blocks",
    "innodb_page_size",
    "innodb_buffer_pool_pages_total",
    "innodb_buffer_pool_pages_free",
    "key_blocks_unused",
    "key_cache_block_size",
    "master_status_position",
    "read_master_log_pos",
    "relay_log_pos",
    "exec_master_log_pos",
    "relay_log_space",
    "seconds_behind_master",
];

/// Null-filled when absent so the column set never shrinks across server versions.
pub const ALWAYS_PRESENT_STATUS: &[&str] = &[
    "queries",
    "open_table_definitions",
    "opened_table_definitions",
    "innodb_buffer_pool_pages_free",
    "innodb_buffer_pool_pages_total",
    "innodb_buffer_pool_reads",
    "innodb_buffer_pool_read_requests",
    "innodb_buffer_pool_pages_flushed",
    "innodb_os_log_written",
    "innodb_row_lock_waits",
    "innodb_row_lock_current_waits",
    "master_status_position",
    "master_status_file_number",
    "read_master_log_pos",
    "relay_log_pos",
    "exec_master_log_pos",
    "relay_log_space",
    "seconds_behind_master",
    "os_loadavg_millis",
    "os_cpu_user",
    "os_cpu_nice",
    "os_cpu_system",
    "os_cpu_idle",
    "os_mem_total_kb",
    "os_mem_free_kb",
    "os_mem_active_kb",
    "os_swap_total_kb",
    "os_swap_free_kb",
    "os_root_mountpoint_usage_percent",
    "os_datadir_mountpoint_usage_percent",
    "os_tmpdir_mountpoint_usage_percent",
    "os_page_ins",
    "os_page_outs",
    "os_swap_ins",
    "os_swap_outs",
];
