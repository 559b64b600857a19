/*
 * Responsibility
 * - HTTP の公開面 (routes の re-export)
 * - identifier: /identifier/_ 配下の JSON エンドポイント
 * - static_files: /identifier/static 配下の静的ファイル
 */
pub mod health;
pub mod identifier;
pub mod static_files;
